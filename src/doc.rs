//! Line-oriented pretty-printing combinator shared by the renderers.
//!
//! A `Doc` is an indentation-aware description of output lines. The indent
//! string is supplied at render time, so one value prints at any indent width.

#[derive(Debug, Clone, PartialEq)]
pub enum Doc {
    Line(String),
    Seq(Vec<Doc>),
    Indent(Box<Doc>),
    /// An empty line, emitted with no indentation.
    Blank,
    /// Emits nothing; the explicit form of "skip this".
    Absent,
}

impl Doc {
    pub fn line(text: impl Into<String>) -> Doc {
        Doc::Line(text.into())
    }

    pub fn seq(children: Vec<Doc>) -> Doc {
        Doc::Seq(children)
    }

    pub fn indent(child: Doc) -> Doc {
        Doc::Indent(Box::new(child))
    }

    /// Conditional inclusion: the thunk only runs when the condition holds.
    pub fn when(cond: bool, doc: impl FnOnce() -> Doc) -> Doc {
        if cond { doc() } else { Doc::Absent }
    }

    /// The open / indented-body / close triple.
    pub fn block(open: impl Into<String>, body: Doc, close: impl Into<String>) -> Doc {
        Doc::Seq(vec![Doc::line(open), Doc::indent(body), Doc::line(close)])
    }

    /// Interleave a separator between the non-absent docs.
    pub fn join(docs: Vec<Doc>, sep: Doc) -> Doc {
        let mut out = Vec::new();
        for doc in docs {
            if doc.is_empty() {
                continue;
            }
            if !out.is_empty() {
                out.push(sep.clone());
            }
            out.push(doc);
        }
        Doc::Seq(out)
    }

    /// True when the doc emits no lines at all.
    pub fn is_empty(&self) -> bool {
        match self {
            Doc::Line(_) | Doc::Blank => false,
            Doc::Seq(children) => children.iter().all(Doc::is_empty),
            Doc::Indent(child) => child.is_empty(),
            Doc::Absent => true,
        }
    }

    /// Fold the doc into text. Pure and total: the output depends only on the
    /// doc value and the indent string.
    pub fn render(&self, indent: &str) -> String {
        let mut out = String::new();
        self.walk(0, indent, &mut out);
        out
    }

    fn walk(&self, level: usize, indent: &str, out: &mut String) {
        match self {
            Doc::Line(text) => {
                for _ in 0..level {
                    out.push_str(indent);
                }
                out.push_str(text);
                out.push('\n');
            }
            Doc::Seq(children) => {
                for child in children {
                    child.walk(level, indent, out);
                }
            }
            Doc::Indent(child) => child.walk(level + 1, indent, out),
            Doc::Blank => out.push('\n'),
            Doc::Absent => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn line_renders_with_indent_level() {
        let doc = Doc::seq(vec![Doc::line("a"), Doc::indent(Doc::line("b"))]);
        assert_eq!(doc.render("  "), "a\n  b\n");
    }

    #[test]
    fn indent_string_is_a_render_parameter() {
        let doc = Doc::indent(Doc::line("x"));
        assert_eq!(doc.render("    "), "    x\n");
        assert_eq!(doc.render("\t"), "\tx\n");
        assert_eq!(doc.render(""), "x\n");
    }

    #[test]
    fn blank_emits_empty_line_without_indentation() {
        let doc = Doc::indent(Doc::seq(vec![Doc::line("a"), Doc::Blank, Doc::line("b")]));
        assert_eq!(doc.render("  "), "  a\n\n  b\n");
    }

    #[test]
    fn absent_emits_nothing() {
        let doc = Doc::seq(vec![Doc::line("a"), Doc::Absent, Doc::line("b")]);
        assert_eq!(doc.render("  "), "a\nb\n");
    }

    #[test]
    fn nested_indent_accumulates() {
        let doc = Doc::indent(Doc::indent(Doc::line("deep")));
        assert_eq!(doc.render(" "), "  deep\n");
    }

    #[test]
    fn when_skips_on_false() {
        assert_eq!(Doc::when(false, || Doc::line("never")), Doc::Absent);
        assert_eq!(Doc::when(true, || Doc::line("yes")), Doc::line("yes"));
    }

    #[test]
    fn block_builds_open_body_close() {
        let doc = Doc::block("subgraph s", Doc::line("A"), "end");
        assert_eq!(doc.render("    "), "subgraph s\n    A\nend\n");
    }

    #[test]
    fn join_skips_absent_docs() {
        let doc = Doc::join(
            vec![Doc::line("a"), Doc::Absent, Doc::line("b")],
            Doc::Blank,
        );
        assert_eq!(doc.render(""), "a\n\nb\n");
    }

    #[test]
    fn empty_seq_is_empty() {
        assert!(Doc::seq(vec![]).is_empty());
        assert!(Doc::seq(vec![Doc::Absent]).is_empty());
        assert!(!Doc::seq(vec![Doc::Blank]).is_empty());
    }
}
