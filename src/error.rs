pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("flowchart parse error: {message}")]
    Parse { message: String },

    /// A link or subgraph references a node id that is not in the node list.
    /// This is a broken embedder invariant, reported before any text is emitted.
    #[error("unknown node `{id}` referenced by {context}")]
    UnknownNode { id: String, context: String },
}

impl Error {
    pub(crate) fn parse(message: impl Into<String>) -> Self {
        Error::Parse {
            message: message.into(),
        }
    }

    pub(crate) fn unknown_node(id: &str, context: &str) -> Self {
        Error::UnknownNode {
            id: id.to_string(),
            context: context.to_string(),
        }
    }
}
