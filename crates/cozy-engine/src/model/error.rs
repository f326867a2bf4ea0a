use thiserror::Error;

/// Errors raised by the document model.
///
/// `OutOfRange` is a contract violation: callers that stay within the depths
/// and positions a document reports never see it. The other variants describe
/// content the schema would reject.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("position {pos} out of range (document content size {size})")]
    PositionOutOfRange { pos: usize, size: usize },

    #[error("depth {depth} out of range (resolved depth {max})")]
    OutOfRange { depth: usize, max: usize },

    #[error("replace failed: {0}")]
    Replace(String),

    #[error("invalid content for node {0}")]
    InvalidContent(String),

    #[error("unknown node type: {0}")]
    UnknownNodeType(String),

    #[error("unknown mark type: {0}")]
    UnknownMarkType(String),

    #[error("no value supplied for required attribute {attr} of {type_name}")]
    MissingAttr { type_name: String, attr: String },

    #[error("invalid content expression {expr:?}: {reason}")]
    ContentExpr { expr: String, reason: String },
}
