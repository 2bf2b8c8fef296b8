//! The [`ReferenceRegistry`] trait defining the registry interface.

use cask_types::{Digest, OwnerId, ReferenceId};

use crate::error::Result;
use crate::types::{NewReference, Reference};

/// Durable storage for references.
///
/// Implementations must be thread-safe and enforce uniqueness of
/// (owner, digest) themselves: callers check first, but `create` is the
/// final guard and must fail with `DuplicateReference` rather than store a
/// second reference.
///
/// The registry never touches blob reference counts. Pairing each `create`
/// with an increment and each `delete` with a decrement is the caller's job.
pub trait ReferenceRegistry: Send + Sync {
    /// The owner's reference to `digest`, if any.
    fn find_by_owner_and_digest(
        &self,
        owner: &OwnerId,
        digest: &Digest,
    ) -> Result<Option<Reference>>;

    /// Point lookup by id.
    fn get(&self, id: &ReferenceId) -> Result<Option<Reference>>;

    /// Validate and store a new reference.
    fn create(&self, new: NewReference) -> Result<Reference>;

    /// Remove a reference owned by `owner` and return it.
    ///
    /// Fails with `NotFound` if the id is unknown and `Forbidden` if it
    /// belongs to someone else.
    fn delete(&self, id: &ReferenceId, owner: &OwnerId) -> Result<Reference>;

    /// The owner's references, newest first.
    fn list_by_owner(&self, owner: &OwnerId) -> Result<Vec<Reference>>;

    /// Number of references, across all owners, pointing at `digest`.
    fn count_for_digest(&self, digest: &Digest) -> Result<u64>;

    /// Every reference, ordered by id.
    fn list_all(&self) -> Result<Vec<Reference>>;
}
