use std::path::PathBuf;

use cask_types::Digest;

/// Errors from content store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No blob is recorded under this digest.
    #[error("blob not found: {0}")]
    NotFound(Digest),

    /// Bytes written to disk did not hash to the expected digest. The
    /// source changed between inspection and storage.
    #[error("hash mismatch for {digest}: computed {computed}")]
    HashMismatch { digest: Digest, computed: Digest },

    /// Reclamation was requested for a blob that still has references.
    #[error("blob {digest} still has {count} reference(s)")]
    StillReferenced { digest: Digest, count: u64 },

    /// A decrement was applied to a blob whose count is already zero.
    #[error("reference count underflow for {0}")]
    CounterUnderflow(Digest),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A persisted snapshot failed its integrity check.
    #[error("corrupt snapshot {path:?}: {reason}")]
    CorruptSnapshot { path: PathBuf, reason: String },

    /// I/O error from the filesystem, including storage exhaustion.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A catalog lock was poisoned by a panicking writer.
    #[error("catalog lock poisoned")]
    LockPoisoned,
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
