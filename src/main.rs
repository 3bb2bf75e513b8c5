use std::io::Read;

use clap::Parser;

use mflow::{Indent, RenderOptions};

#[derive(Parser)]
#[command(name = "mflow", about = "Parse Mermaid flowcharts and emit canonical source")]
struct Cli {
    /// Input file (reads from stdin if not provided)
    file: Option<std::path::PathBuf>,

    /// Indent width per level: a number of spaces, or "tab"
    #[arg(long, default_value = "4")]
    indent: String,

    /// Declare every node before the links, in alphabetical order
    #[arg(long)]
    sort_nodes: bool,

    /// Attach class assignments inline with ":::" instead of class statements
    #[arg(long)]
    inline_classes: bool,

    /// Merge consecutive links into multi-hop chain statements
    #[arg(long, short = 'c')]
    compact: bool,
}

fn main() {
    let cli = Cli::parse();

    let indent = match cli.indent.as_str() {
        "tab" => Indent::Tab,
        text => match text.parse::<usize>() {
            Ok(n) => Indent::Spaces(n),
            Err(_) => {
                eprintln!("ERROR: --indent expects a number or \"tab\", got {text:?}");
                std::process::exit(1);
            }
        },
    };

    let input = match cli.file {
        Some(path) => std::fs::read_to_string(&path).unwrap_or_else(|e| {
            eprintln!("ERROR: failed to read {}: {e}", path.display());
            std::process::exit(1);
        }),
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf).unwrap_or_else(|e| {
                eprintln!("ERROR: failed to read stdin: {e}");
                std::process::exit(1);
            });
            buf
        }
    };

    let options = RenderOptions {
        indent,
        sort_nodes: cli.sort_nodes,
        inline_classes: cli.inline_classes,
        compact_links: cli.compact,
    };

    match mflow::normalize(&input, &options) {
        Ok(output) => print!("{output}"),
        Err(e) => {
            eprintln!("ERROR: {e}");
            std::process::exit(1);
        }
    }
}
