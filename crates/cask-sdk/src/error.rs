use cask_hash::HashError;
use cask_refs::RefError;
use cask_store::StoreError;
use cask_types::{MediaType, ReferenceId, TypeError};
use thiserror::Error;

/// Caller-facing classification of an [`SdkError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed input or content/type mismatch. Not retryable.
    Validation,
    NotFound,
    Forbidden,
    Unauthenticated,
    /// Disk or persistence failure. Partial mutations have been rolled back.
    Io,
    /// Broken internal invariant.
    Internal,
}

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("content does not match declared type: declared {declared}, detected {sniffed}")]
    ContentMismatch {
        declared: MediaType,
        sniffed: MediaType,
    },

    #[error("upload exceeds the {limit}-byte limit")]
    TooLarge { limit: u64 },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("reference not found: {0}")]
    NotFound(ReferenceId),

    #[error("reference {0} belongs to another owner")]
    Forbidden(ReferenceId),

    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("registry error: {0}")]
    Registry(RefError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl SdkError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ContentMismatch { .. }
            | Self::TooLarge { .. }
            | Self::InvalidInput(_)
            | Self::Config(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::Unauthenticated(_) => ErrorKind::Unauthenticated,
            Self::Io(_) => ErrorKind::Io,
            Self::Store(e) | Self::Registry(RefError::Store(e)) => store_kind(e),
            Self::Registry(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

fn store_kind(e: &StoreError) -> ErrorKind {
    match e {
        StoreError::Io(_)
        | StoreError::HashMismatch { .. }
        | StoreError::CorruptSnapshot { .. }
        | StoreError::Serialization(_) => ErrorKind::Io,
        _ => ErrorKind::Internal,
    }
}

impl From<HashError> for SdkError {
    fn from(e: HashError) -> Self {
        match e {
            HashError::ContentMismatch { declared, sniffed } => {
                Self::ContentMismatch { declared, sniffed }
            }
            HashError::TooLarge { limit } => Self::TooLarge { limit },
            HashError::Io(e) => Self::Io(e),
        }
    }
}

impl From<RefError> for SdkError {
    fn from(e: RefError) -> Self {
        match e {
            RefError::NotFound(id) => Self::NotFound(id),
            RefError::Forbidden { id } => Self::Forbidden(id),
            RefError::InvalidDisplayName { .. } => Self::InvalidInput(e.to_string()),
            other => Self::Registry(other),
        }
    }
}

impl From<TypeError> for SdkError {
    fn from(e: TypeError) -> Self {
        Self::InvalidInput(e.to_string())
    }
}

pub type SdkResult<T> = Result<T, SdkError>;
