use cask_types::Digest;

use crate::blob::Blob;
use crate::error::StoreResult;

/// Outcome of inserting a blob record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Insertion {
    /// The record was new and has been stored.
    Inserted(Blob),
    /// A record for the digest already existed and was left untouched.
    Existing(Blob),
}

impl Insertion {
    pub fn into_blob(self) -> Blob {
        match self {
            Self::Inserted(blob) | Self::Existing(blob) => blob,
        }
    }

    pub fn was_inserted(&self) -> bool {
        matches!(self, Self::Inserted(_))
    }
}

/// Durable mapping from digest to blob metadata and reference count.
///
/// All implementations must satisfy these invariants:
/// - At most one record exists per digest. A second insert for the same
///   digest is not an error: it reports [`Insertion::Existing`] so callers
///   can attach instead of create.
/// - Counter operations are atomic with respect to each other; callers never
///   read-modify-write a count.
/// - A failed operation leaves the catalog unchanged.
pub trait BlobCatalog: Send + Sync {
    /// Point lookup. Returns `Ok(None)` for an unknown digest.
    fn get(&self, digest: &Digest) -> StoreResult<Option<Blob>>;

    /// Insert a record unless one already exists for its digest.
    fn insert(&self, blob: Blob) -> StoreResult<Insertion>;

    /// Increment the reference count and return the new value.
    fn increment(&self, digest: &Digest) -> StoreResult<u64>;

    /// Decrement the reference count and return the new value.
    ///
    /// Fails with `CounterUnderflow` if the count is already zero.
    fn decrement(&self, digest: &Digest) -> StoreResult<u64>;

    /// Overwrite the reference count. Used only by consistency repair.
    fn set_count(&self, digest: &Digest, count: u64) -> StoreResult<()>;

    /// Remove the record if its count is zero.
    ///
    /// Returns the removed record, `Ok(None)` if no record exists, and
    /// `StillReferenced` if the count is non-zero.
    fn remove_if_unreferenced(&self, digest: &Digest) -> StoreResult<Option<Blob>>;

    /// All records, ordered by digest.
    fn list(&self) -> StoreResult<Vec<Blob>>;

    /// Look up several digests at once, as one consistent read.
    ///
    /// The default calls `get()` for each digest; backends with a single
    /// table lock should override it.
    fn get_many(&self, digests: &[Digest]) -> StoreResult<Vec<Option<Blob>>> {
        digests.iter().map(|d| self.get(d)).collect()
    }

    fn contains(&self, digest: &Digest) -> StoreResult<bool> {
        Ok(self.get(digest)?.is_some())
    }
}
