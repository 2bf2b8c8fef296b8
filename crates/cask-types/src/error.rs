use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid media type: {0:?}")]
    InvalidMediaType(String),

    #[error("owner id must not be empty")]
    EmptyOwner,

    #[error("invalid reference id: {0}")]
    InvalidReferenceId(String),
}
