//! Deterministic flowchart renderer.
//!
//! `render` turns an AST back into source text via a [`Doc`] value, so
//! indentation is uniform and the output is a pure function of the AST and
//! the options. Everything it emits re-parses to an equivalent AST.

use std::collections::{HashMap, HashSet};

use crate::ast::*;
use crate::doc::Doc;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indent {
    Spaces(usize),
    Tab,
}

impl Indent {
    fn text(&self) -> String {
        match self {
            Indent::Spaces(n) => " ".repeat(*n),
            Indent::Tab => "\t".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub indent: Indent,
    /// Declare nodes in lexicographic id order instead of AST order.
    pub sort_nodes: bool,
    /// Print `:::class` markers inline instead of `class` statements.
    pub inline_classes: bool,
    /// Merge eligible links into one printed chain per line.
    pub compact_links: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions {
            indent: Indent::Spaces(4),
            sort_nodes: false,
            inline_classes: false,
            compact_links: false,
        }
    }
}

pub fn render(ast: &FlowchartAst, options: &RenderOptions) -> Result<String> {
    validate(ast)?;
    let doc = Renderer::new(ast, options).build();
    Ok(doc.render(&options.indent.text()))
}

/// A link or membership naming an id outside the node list is a broken
/// embedder invariant; report it before emitting anything.
fn validate(ast: &FlowchartAst) -> Result<()> {
    for link in &ast.links {
        for id in [&link.source, &link.target] {
            if !ast.has_node(id) {
                return Err(Error::unknown_node(id, "a link"));
            }
        }
    }
    for sg in &ast.subgraphs {
        for id in &sg.nodes {
            if !ast.has_node(id) {
                return Err(Error::unknown_node(id, &format!("subgraph `{}`", sg.id)));
            }
        }
    }
    Ok(())
}

struct Renderer<'a> {
    ast: &'a FlowchartAst,
    options: &'a RenderOptions,
    declared: HashSet<&'a str>,
    rendered: Vec<bool>,
}

impl<'a> Renderer<'a> {
    fn new(ast: &'a FlowchartAst, options: &'a RenderOptions) -> Renderer<'a> {
        Renderer {
            ast,
            options,
            declared: HashSet::new(),
            rendered: vec![false; ast.links.len()],
        }
    }

    fn build(&mut self) -> Doc {
        let ast = self.ast;
        let mut items: Vec<Doc> = Vec::new();

        if let Some(desc) = &ast.acc_description {
            items.push(Doc::line(format!("accDescr: {desc}")));
        }

        for sg in &ast.subgraphs {
            items.push(self.subgraph_doc(sg));
        }

        // Nodes touched by no remaining link get standalone declarations;
        // the rest are declared inline on first appearance in a link line.
        let mut endpoints: HashSet<&str> = HashSet::new();
        for (i, link) in ast.links.iter().enumerate() {
            if !self.rendered[i] {
                endpoints.insert(link.source.as_str());
                endpoints.insert(link.target.as_str());
            }
        }
        let mut nodes: Vec<&Node> = ast.nodes.iter().collect();
        if self.options.sort_nodes {
            nodes.sort_unstable_by(|a, b| a.id.cmp(&b.id));
        }
        for node in nodes {
            if !self.declared.contains(node.id.as_str()) && !endpoints.contains(node.id.as_str())
            {
                let decl = self.node_token(&node.id);
                items.push(Doc::line(decl));
            }
        }

        let remaining: Vec<usize> = (0..ast.links.len()).filter(|&i| !self.rendered[i]).collect();
        self.links_docs(&remaining, &mut items);

        let mut decorations: Vec<Doc> = Vec::new();
        for def in &ast.class_defs {
            decorations.push(Doc::line(format!(
                "classDef {} {}",
                def.name,
                style_text(&def.styles)
            )));
        }
        if !self.options.inline_classes {
            for (node, classes) in &ast.classes {
                if !classes.is_empty() {
                    decorations.push(Doc::line(format!("class {} {}", node, classes.join(","))));
                }
            }
        }
        for click in &ast.clicks {
            decorations.push(Doc::line(click_text(click)));
        }
        for style in &ast.link_styles {
            decorations.push(Doc::line(link_style_text(style)));
        }

        if !items.is_empty() && !decorations.is_empty() {
            items.push(Doc::Blank);
        }
        items.extend(decorations);

        let front = match &ast.title {
            Some(title) => Doc::seq(vec![
                Doc::line("---"),
                Doc::line(format!("title: {title}")),
                Doc::line("---"),
            ]),
            None => Doc::Absent,
        };
        Doc::seq(vec![
            front,
            Doc::line(format!("flowchart {}", ast.direction.as_str())),
            Doc::indent(Doc::seq(items)),
        ])
    }

    fn subgraph_doc(&mut self, sg: &'a Subgraph) -> Doc {
        let ast = self.ast;
        let mut body: Vec<Doc> = Vec::new();
        if let Some(direction) = sg.direction {
            body.push(Doc::line(format!("direction {}", direction.as_str())));
        }

        let mut members: Vec<&str> = sg.nodes.iter().map(String::as_str).collect();
        if self.options.sort_nodes {
            members.sort_unstable();
        }
        for id in &members {
            if !self.declared.contains(id) {
                let decl = self.node_token(id);
                body.push(Doc::line(decl));
            }
        }

        let member_set: HashSet<&str> = sg.nodes.iter().map(String::as_str).collect();
        let internal: Vec<usize> = (0..ast.links.len())
            .filter(|&i| {
                !self.rendered[i]
                    && member_set.contains(ast.links[i].source.as_str())
                    && member_set.contains(ast.links[i].target.as_str())
            })
            .collect();
        self.links_docs(&internal, &mut body);

        let header = match &sg.title {
            Some(title) => format!("subgraph {}[{}]", sg.id, quote(title)),
            None => format!("subgraph {}", sg.id),
        };
        Doc::block(header, Doc::seq(body), "end")
    }

    /// Render the given links, one line each, or as compacted chains when the
    /// option is set. Marks every emitted link as rendered.
    fn links_docs(&mut self, indices: &[usize], out: &mut Vec<Doc>) {
        let ast = self.ast;
        if !self.options.compact_links {
            for &i in indices {
                let link = &ast.links[i];
                let line = format!(
                    "{} {} {}",
                    self.node_token(&link.source),
                    arrow_text(link),
                    self.node_token(&link.target)
                );
                out.push(Doc::line(line));
                self.rendered[i] = true;
            }
            return;
        }

        // Adjacency and in-degree over the not-yet-rendered links only.
        let mut adjacency: HashMap<&str, Vec<usize>> = HashMap::new();
        let mut indegree: HashMap<&str, usize> = HashMap::new();
        for &i in indices {
            adjacency
                .entry(ast.links[i].source.as_str())
                .or_default()
                .push(i);
            *indegree.entry(ast.links[i].target.as_str()).or_default() += 1;
        }

        let mut visited: HashSet<usize> = HashSet::new();
        for &seed in indices {
            if visited.contains(&seed) {
                continue;
            }
            visited.insert(seed);
            let mut chain = vec![seed];
            let mut current = ast.links[seed].target.as_str();
            loop {
                // A node that other links also target ends the chain:
                // extending through it would change what a re-parse rebuilds.
                if indegree.get(current).copied().unwrap_or(0) != 1 {
                    break;
                }
                let unvisited: Vec<usize> = adjacency
                    .get(current)
                    .map(|links| {
                        links
                            .iter()
                            .copied()
                            .filter(|i| !visited.contains(i))
                            .collect()
                    })
                    .unwrap_or_default();
                if unvisited.len() != 1 {
                    break;
                }
                let next = unvisited[0];
                visited.insert(next);
                chain.push(next);
                current = ast.links[next].target.as_str();
            }

            let mut line = self.node_token(&ast.links[chain[0]].source);
            for &i in &chain {
                line.push(' ');
                line.push_str(&arrow_text(&ast.links[i]));
                line.push(' ');
                line.push_str(&self.node_token(&ast.links[i].target));
                self.rendered[i] = true;
            }
            out.push(Doc::line(line));
        }
    }

    /// The node's full declaration on first appearance, its bare id after.
    fn node_token(&mut self, id: &str) -> String {
        if self.declared.contains(id) {
            return id.to_string();
        }
        let Some(node) = self.ast.node(id) else {
            return id.to_string();
        };
        self.declared.insert(node.id.as_str());
        let (open, close) = node.shape.brackets();
        let mut out = format!("{}{}{}{}", node.id, open, quote(node.label()), close);
        if self.options.inline_classes {
            let classes = self.ast.classes_for(&node.id);
            if !classes.is_empty() {
                out.push_str(":::");
                out.push_str(&classes.join(","));
            }
        }
        out
    }
}

fn quote(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

fn arrow_text(link: &Link) -> String {
    let lead_in = match link.arrow {
        ArrowType::Circle => "o",
        ArrowType::Cross => "x",
        _ => "",
    };
    let lead_out = match link.arrow {
        ArrowType::Point => ">",
        ArrowType::Circle => "o",
        ArrowType::Cross => "x",
        ArrowType::Open => "",
    };
    let closed_chars = link.length + 1;
    let open_chars = link.length + 2;
    let body = match link.stroke {
        // Dotted bodies are a fixed three characters; length never stretches them.
        Stroke::Dotted => "-.-".to_string(),
        Stroke::Normal if link.arrow == ArrowType::Open => "-".repeat(open_chars),
        Stroke::Normal => "-".repeat(closed_chars),
        Stroke::Thick if link.arrow == ArrowType::Open => "=".repeat(open_chars),
        Stroke::Thick => "=".repeat(closed_chars),
    };
    let mut out = format!("{lead_in}{body}{lead_out}");
    if let Some(text) = &link.text {
        out.push('|');
        out.push_str(&quote(text));
        out.push('|');
    }
    out
}

fn style_text(styles: &[(String, String)]) -> String {
    styles
        .iter()
        .map(|(prop, value)| format!("{prop}:{value}"))
        .collect::<Vec<_>>()
        .join(",")
}

fn click_text(click: &Click) -> String {
    match &click.action {
        ClickAction::Href { url, target } => {
            let mut out = format!("click {} href {}", click.node, quote(url));
            if let Some(target) = target {
                out.push(' ');
                out.push_str(target);
            }
            out
        }
        ClickAction::Call { name, args } => match args {
            Some(args) => format!("click {} call {}({})", click.node, name, args),
            None => format!("click {} call {}", click.node, name),
        },
    }
}

fn link_style_text(style: &LinkStyle) -> String {
    let mut out = match style.index {
        LinkIndex::Default => "linkStyle default".to_string(),
        LinkIndex::At(i) => format!("linkStyle {i}"),
    };
    if let Some(curve) = &style.interpolate {
        out.push_str(" interpolate ");
        out.push_str(curve);
    }
    if !style.styles.is_empty() {
        out.push(' ');
        out.push_str(&style_text(&style.styles));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;

    fn rendered(input: &str, options: &RenderOptions) -> String {
        render(&parse(input).unwrap(), options).unwrap()
    }

    #[test]
    fn arrow_text_covers_types_and_strokes() {
        let mut link = Link::plain("A", "B");
        assert_eq!(arrow_text(&link), "-->");
        link.arrow = ArrowType::Open;
        assert_eq!(arrow_text(&link), "---");
        link.arrow = ArrowType::Circle;
        assert_eq!(arrow_text(&link), "o--o");
        link.arrow = ArrowType::Cross;
        assert_eq!(arrow_text(&link), "x--x");
        link.arrow = ArrowType::Point;
        link.stroke = Stroke::Thick;
        assert_eq!(arrow_text(&link), "==>");
        link.stroke = Stroke::Dotted;
        assert_eq!(arrow_text(&link), "-.->");
        link.stroke = Stroke::Normal;
        link.length = 3;
        assert_eq!(arrow_text(&link), "---->");
        link.arrow = ArrowType::Open;
        assert_eq!(arrow_text(&link), "-----");
        link.stroke = Stroke::Dotted;
        assert_eq!(arrow_text(&link), "-.-");
    }

    #[test]
    fn link_text_is_quoted() {
        let mut link = Link::plain("A", "B");
        link.text = Some("yes".to_string());
        assert_eq!(arrow_text(&link), "-->|\"yes\"|");
    }

    #[test]
    fn renders_simple_graph() {
        let output = rendered("flowchart LR\n    A[Start] --> B\n", &RenderOptions::default());
        assert_eq!(output, "flowchart LR\n    A[\"Start\"] --> B[\"B\"]\n");
    }

    #[test]
    fn node_declared_once_then_referenced_by_id() {
        let output = rendered(
            "flowchart LR\n    A --> B\n    A --> C\n",
            &RenderOptions::default(),
        );
        assert_eq!(
            output,
            "flowchart LR\n    A[\"A\"] --> B[\"B\"]\n    A --> C[\"C\"]\n"
        );
    }

    #[test]
    fn indent_option_changes_width() {
        let input = "flowchart LR\n    A --> B\n";
        let two = rendered(
            input,
            &RenderOptions {
                indent: Indent::Spaces(2),
                ..RenderOptions::default()
            },
        );
        assert_eq!(two, "flowchart LR\n  A[\"A\"] --> B[\"B\"]\n");
        let tab = rendered(
            input,
            &RenderOptions {
                indent: Indent::Tab,
                ..RenderOptions::default()
            },
        );
        assert_eq!(tab, "flowchart LR\n\tA[\"A\"] --> B[\"B\"]\n");
    }

    #[test]
    fn sort_nodes_orders_isolated_declarations() {
        let input = "flowchart LR\n    b\n    a\n    c\n";
        let output = rendered(
            input,
            &RenderOptions {
                sort_nodes: true,
                ..RenderOptions::default()
            },
        );
        assert_eq!(
            output,
            "flowchart LR\n    a[\"a\"]\n    b[\"b\"]\n    c[\"c\"]\n"
        );
    }

    #[test]
    fn inline_classes_replace_class_statements() {
        let input = "flowchart LR\n    A --> B\n    class A hot\n";
        let inline = rendered(
            input,
            &RenderOptions {
                inline_classes: true,
                ..RenderOptions::default()
            },
        );
        assert!(inline.contains("A[\"A\"]:::hot"), "got: {inline}");
        assert!(!inline.contains("\nclass"), "got: {inline}");

        let separate = rendered(input, &RenderOptions::default());
        assert!(separate.contains("    class A hot\n"), "got: {separate}");
    }

    #[test]
    fn compact_links_merges_a_linear_chain() {
        let input = "flowchart LR\n    A --> B\n    B --> C\n    C --> D\n";
        let output = rendered(
            input,
            &RenderOptions {
                compact_links: true,
                ..RenderOptions::default()
            },
        );
        assert_eq!(
            output,
            "flowchart LR\n    A[\"A\"] --> B[\"B\"] --> C[\"C\"] --> D[\"D\"]\n"
        );
    }

    #[test]
    fn compact_links_stops_at_branches() {
        let input = "flowchart LR\n    A --> B\n    B --> C\n    B --> D\n";
        let output = rendered(
            input,
            &RenderOptions {
                compact_links: true,
                ..RenderOptions::default()
            },
        );
        // B has two outgoing links, so the chain ends after the first hop.
        assert_eq!(
            output,
            "flowchart LR\n    A[\"A\"] --> B[\"B\"]\n    B --> C[\"C\"]\n    B --> D[\"D\"]\n"
        );
    }

    #[test]
    fn compact_links_stops_at_joins() {
        let input = "flowchart LR\n    A --> B\n    B --> C\n    X --> B\n";
        let output = rendered(
            input,
            &RenderOptions {
                compact_links: true,
                ..RenderOptions::default()
            },
        );
        // B is targeted twice, so no chain extends through it.
        assert_eq!(
            output,
            "flowchart LR\n    A[\"A\"] --> B[\"B\"]\n    B --> C[\"C\"]\n    X[\"X\"] --> B\n"
        );
    }

    #[test]
    fn compact_links_survives_cycles() {
        let input = "flowchart LR\n    A --> B\n    B --> C\n    C --> A\n";
        let output = rendered(
            input,
            &RenderOptions {
                compact_links: true,
                ..RenderOptions::default()
            },
        );
        assert_eq!(
            output,
            "flowchart LR\n    A[\"A\"] --> B[\"B\"] --> C[\"C\"] --> A\n"
        );
    }

    #[test]
    fn subgraph_renders_members_and_internal_links() {
        let input = "flowchart TD\n    subgraph api[\"API\"]\n        direction LR\n        A --> B\n    end\n    B --> C\n";
        let output = rendered(input, &RenderOptions::default());
        assert_eq!(
            output,
            "flowchart TD\n    subgraph api[\"API\"]\n        direction LR\n        A[\"A\"]\n        B[\"B\"]\n        A --> B\n    end\n    B --> C[\"C\"]\n"
        );
    }

    #[test]
    fn decorations_render_after_statements() {
        let input = "flowchart LR\n    A --> B\n    classDef hot fill:#f96\n    class A hot\n    click A href \"https://example.com\" _blank\n    linkStyle 0 stroke:red\n";
        let output = rendered(input, &RenderOptions::default());
        assert_eq!(
            output,
            "flowchart LR\n    A[\"A\"] --> B[\"B\"]\n\n    classDef hot fill:#f96\n    class A hot\n    click A href \"https://example.com\" _blank\n    linkStyle 0 stroke:red\n"
        );
    }

    #[test]
    fn title_renders_as_front_matter() {
        let input = "---\ntitle: Checkout\n---\nflowchart LR\n    A --> B\n";
        let output = rendered(input, &RenderOptions::default());
        assert!(output.starts_with("---\ntitle: Checkout\n---\nflowchart LR\n"));
    }

    #[test]
    fn label_quotes_are_escaped() {
        let ast = {
            let mut ast = FlowchartAst::new(Direction::Lr);
            ast.upsert_node(Node {
                text: Some("say \"hi\"".to_string()),
                ..Node::new("A")
            });
            ast
        };
        let output = render(&ast, &RenderOptions::default()).unwrap();
        assert_eq!(output, "flowchart LR\n    A[\"say \\\"hi\\\"\"]\n");
    }

    #[test]
    fn link_to_unknown_node_is_an_error() {
        let mut ast = FlowchartAst::new(Direction::Lr);
        ast.ensure_node("A");
        ast.links.push(Link::plain("A", "ghost"));
        let err = render(&ast, &RenderOptions::default()).unwrap_err();
        assert!(err.to_string().contains("ghost"), "got: {err}");
    }
}
