//! Error types for reference registry operations.

use cask_store::StoreError;
use cask_types::{Digest, OwnerId, ReferenceId};
use thiserror::Error;

/// Errors that can occur during reference operations.
#[derive(Debug, Error)]
pub enum RefError {
    /// No reference with this id exists.
    #[error("reference not found: {0}")]
    NotFound(ReferenceId),

    /// The reference exists but belongs to another owner.
    #[error("reference {id} is not owned by the caller")]
    Forbidden { id: ReferenceId },

    /// The owner already has a reference to this digest.
    #[error("{owner} already references {digest} as {existing}")]
    DuplicateReference {
        owner: OwnerId,
        digest: Digest,
        existing: ReferenceId,
    },

    /// The display name failed validation.
    #[error("invalid display name {name:?}: {reason}")]
    InvalidDisplayName { name: String, reason: String },

    /// Persisting the registry failed.
    #[error("registry storage error: {0}")]
    Store(#[from] StoreError),

    /// The registry lock was poisoned by a panicking writer.
    #[error("registry lock poisoned")]
    LockPoisoned,
}

/// Convenience type alias for registry operations.
pub type Result<T> = std::result::Result<T, RefError>;
