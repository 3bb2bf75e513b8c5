pub mod ast;
pub mod doc;
pub mod error;
pub mod flowchart;
pub mod parser;
pub mod render;

pub use ast::{
    ArrowType, ClassDef, Click, ClickAction, Direction, FlowchartAst, Link, LinkIndex, LinkStyle,
    Node, NodeShape, Stroke, Subgraph,
};
pub use error::{Error, Result};
pub use flowchart::{Flowchart, LinkOptions};
pub use render::{Indent, RenderOptions};

/// Parse a flowchart source into an editable [`Flowchart`].
pub fn parse(input: &str) -> Result<Flowchart> {
    Flowchart::parse(input)
}

/// Parse and immediately re-render: the canonical form of the input under
/// the given options.
pub fn normalize(input: &str, options: &RenderOptions) -> Result<String> {
    parse(input)?.render(options)
}
