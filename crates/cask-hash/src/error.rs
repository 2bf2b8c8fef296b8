use cask_types::MediaType;

/// Errors from inspecting uploaded content.
#[derive(Debug, thiserror::Error)]
pub enum HashError {
    /// Declared and sniffed media types are neither equal nor synonyms.
    #[error("content does not match declared type: declared {declared}, detected {sniffed}")]
    ContentMismatch {
        declared: MediaType,
        sniffed: MediaType,
    },

    /// The source is longer than the configured upload limit.
    #[error("content exceeds the {limit}-byte upload limit")]
    TooLarge { limit: u64 },

    /// Reading the source failed (including an aborted transfer).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type HashResult<T> = Result<T, HashError>;
