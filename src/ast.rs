//! Typed in-memory model of one Mermaid flowchart.
//!
//! Every collection is owned and insertion-ordered, so `clone()` is a deep,
//! independent copy and rendering is deterministic for a given AST.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Lr,
    Rl,
    Tb,
    /// `TD` and `TB` both mean top-to-bottom; the authored token is preserved.
    Td,
    Bt,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Lr => "LR",
            Direction::Rl => "RL",
            Direction::Tb => "TB",
            Direction::Td => "TD",
            Direction::Bt => "BT",
        }
    }

    pub fn from_token(token: &str) -> Option<Direction> {
        match token {
            "LR" => Some(Direction::Lr),
            "RL" => Some(Direction::Rl),
            "TB" => Some(Direction::Tb),
            "TD" => Some(Direction::Td),
            "BT" => Some(Direction::Bt),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeShape {
    Square,
    Round,
    Circle,
    DoubleCircle,
    Ellipse,
    Stadium,
    Subroutine,
    Cylinder,
    Diamond,
    Hexagon,
    Odd,
    Trapezoid,
    InvTrapezoid,
    LeanRight,
    LeanLeft,
}

impl NodeShape {
    /// The bracket pair the renderer wraps around the node label.
    pub fn brackets(&self) -> (&'static str, &'static str) {
        match self {
            NodeShape::Square => ("[", "]"),
            NodeShape::Round => ("(", ")"),
            NodeShape::Circle => ("((", "))"),
            NodeShape::DoubleCircle => ("(((", ")))"),
            NodeShape::Ellipse => ("(-", "-)"),
            NodeShape::Stadium => ("([", "])"),
            NodeShape::Subroutine => ("[[", "]]"),
            NodeShape::Cylinder => ("[(", ")]"),
            NodeShape::Diamond => ("{", "}"),
            NodeShape::Hexagon => ("{{", "}}"),
            NodeShape::Odd => (">", "]"),
            NodeShape::Trapezoid => ("[/", "\\]"),
            NodeShape::InvTrapezoid => ("[\\", "/]"),
            NodeShape::LeanRight => ("[/", "/]"),
            NodeShape::LeanLeft => ("[\\", "\\]"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: String,
    pub shape: NodeShape,
    pub text: Option<String>,
}

impl Node {
    pub fn new(id: impl Into<String>) -> Node {
        Node {
            id: id.into(),
            shape: NodeShape::Square,
            text: None,
        }
    }

    /// The printed label: explicit text when present, otherwise the id.
    pub fn label(&self) -> &str {
        self.text.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrowType {
    Open,
    Point,
    Circle,
    Cross,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stroke {
    Normal,
    Thick,
    Dotted,
}

/// One directed edge. Links live in an ordered list, not a set: order drives
/// render determinism and chain detection, and parallel edges and self-loops
/// are legal.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub source: String,
    pub target: String,
    pub arrow: ArrowType,
    pub stroke: Stroke,
    /// Visual stretch of the arrow body; never semantic, always >= 1.
    pub length: usize,
    pub text: Option<String>,
}

impl Link {
    /// The default styling used for synthesized links.
    pub fn plain(source: impl Into<String>, target: impl Into<String>) -> Link {
        Link {
            source: source.into(),
            target: target.into(),
            arrow: ArrowType::Point,
            stroke: Stroke::Normal,
            length: 1,
            text: None,
        }
    }
}

/// Flat membership list; subgraphs do not nest.
#[derive(Debug, Clone, PartialEq)]
pub struct Subgraph {
    pub id: String,
    pub title: Option<String>,
    pub direction: Option<Direction>,
    pub nodes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDef {
    pub name: String,
    pub styles: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClickAction {
    Href {
        url: String,
        target: Option<String>,
    },
    Call {
        name: String,
        args: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Click {
    pub node: String,
    pub action: ClickAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkIndex {
    Default,
    At(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinkStyle {
    pub index: LinkIndex,
    pub styles: Vec<(String, String)>,
    pub interpolate: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlowchartAst {
    pub direction: Direction,
    /// Id-unique, in insertion order. Diagrams are small, so lookups scan.
    pub nodes: Vec<Node>,
    pub links: Vec<Link>,
    pub subgraphs: Vec<Subgraph>,
    pub class_defs: Vec<ClassDef>,
    /// Node id -> ordered class names, in assignment order.
    pub classes: Vec<(String, Vec<String>)>,
    pub clicks: Vec<Click>,
    pub link_styles: Vec<LinkStyle>,
    pub title: Option<String>,
    pub acc_description: Option<String>,
}

impl FlowchartAst {
    pub fn new(direction: Direction) -> FlowchartAst {
        FlowchartAst {
            direction,
            nodes: Vec::new(),
            links: Vec::new(),
            subgraphs: Vec::new(),
            class_defs: Vec::new(),
            classes: Vec::new(),
            clicks: Vec::new(),
            link_styles: Vec::new(),
            title: None,
            acc_description: None,
        }
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    pub fn has_node(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    /// Register a node referenced only by id, keeping any earlier declaration.
    pub fn ensure_node(&mut self, id: &str) {
        if !self.has_node(id) {
            self.nodes.push(Node::new(id));
        }
    }

    /// Insert or overwrite a node, keeping its position when it already exists.
    pub fn upsert_node(&mut self, node: Node) {
        match self.node_mut(&node.id) {
            Some(existing) => *existing = node,
            None => self.nodes.push(node),
        }
    }

    pub fn classes_for(&self, id: &str) -> &[String] {
        self.classes
            .iter()
            .find(|(node, _)| node == id)
            .map(|(_, names)| names.as_slice())
            .unwrap_or(&[])
    }

    pub fn add_class(&mut self, id: &str, class: &str) {
        match self.classes.iter_mut().find(|(node, _)| node == id) {
            Some((_, names)) => {
                if !names.iter().any(|c| c == class) {
                    names.push(class.to_string());
                }
            }
            None => self.classes.push((id.to_string(), vec![class.to_string()])),
        }
    }

    /// The subgraph a node currently belongs to, if any.
    pub fn subgraph_of(&self, id: &str) -> Option<&Subgraph> {
        self.subgraphs
            .iter()
            .find(|sg| sg.nodes.iter().any(|n| n == id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn tb_and_td_are_distinct_tokens() {
        assert_eq!(Direction::from_token("TB"), Some(Direction::Tb));
        assert_eq!(Direction::from_token("TD"), Some(Direction::Td));
        assert_eq!(Direction::Tb.as_str(), "TB");
        assert_eq!(Direction::Td.as_str(), "TD");
    }

    #[test]
    fn label_falls_back_to_id() {
        let node = Node::new("A");
        assert_eq!(node.label(), "A");
        let node = Node {
            text: Some("Start".to_string()),
            ..Node::new("A")
        };
        assert_eq!(node.label(), "Start");
    }

    #[test]
    fn upsert_keeps_position() {
        let mut ast = FlowchartAst::new(Direction::Td);
        ast.ensure_node("A");
        ast.ensure_node("B");
        ast.upsert_node(Node {
            shape: NodeShape::Diamond,
            ..Node::new("A")
        });
        assert_eq!(ast.nodes[0].id, "A");
        assert_eq!(ast.nodes[0].shape, NodeShape::Diamond);
        assert_eq!(ast.nodes.len(), 2);
    }

    #[test]
    fn add_class_deduplicates() {
        let mut ast = FlowchartAst::new(Direction::Lr);
        ast.add_class("A", "hot");
        ast.add_class("A", "hot");
        ast.add_class("A", "cold");
        assert_eq!(ast.classes_for("A"), ["hot", "cold"]);
    }
}
