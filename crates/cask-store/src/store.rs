use std::fs::File;
use std::io::Read;

use cask_types::Digest;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::blob::{Blob, NewBlob};
use crate::error::{StoreError, StoreResult};
use crate::files::{BlobFiles, WriteOutcome};
use crate::lock::{DigestGuard, DigestLocks};
use crate::traits::{BlobCatalog, Insertion};

/// The content store: blob catalog, blob files and per-digest locks.
///
/// Reads are free-standing. Mutations take a [`DigestGuard`] obtained from
/// [`ContentStore::lock`], which names the digest they apply to; holding
/// the guard across a sequence of calls makes that sequence one critical
/// section for the digest.
pub struct ContentStore {
    catalog: Box<dyn BlobCatalog>,
    files: BlobFiles,
    locks: DigestLocks,
}

impl ContentStore {
    pub fn new(catalog: Box<dyn BlobCatalog>, files: BlobFiles, locks: DigestLocks) -> Self {
        Self {
            catalog,
            files,
            locks,
        }
    }

    /// Acquire the lock for `digest`, blocking until it is free.
    pub fn lock(&self, digest: &Digest) -> DigestGuard<'_> {
        self.locks.lock(digest)
    }

    pub fn catalog(&self) -> &dyn BlobCatalog {
        self.catalog.as_ref()
    }

    pub fn files(&self) -> &BlobFiles {
        &self.files
    }

    /// Point lookup with no side effects.
    pub fn find_by_digest(&self, digest: &Digest) -> StoreResult<Option<Blob>> {
        self.catalog.get(digest)
    }

    /// Like [`find_by_digest`](Self::find_by_digest) but fails with
    /// `NotFound` for an unknown digest.
    pub fn get(&self, digest: &Digest) -> StoreResult<Blob> {
        self.catalog
            .get(digest)?
            .ok_or(StoreError::NotFound(*digest))
    }

    pub fn list_blobs(&self) -> StoreResult<Vec<Blob>> {
        self.catalog.list()
    }

    /// Return the blob for the guarded digest, storing it first if needed.
    ///
    /// If the catalog already has the digest the existing record is returned
    /// with `created = false` and `source` is not read. Otherwise the bytes
    /// are written and verified, then the record is inserted with a count of
    /// zero. If the insert fails, a file written by this call is removed
    /// again; metadata is never inserted for bytes that are not on disk.
    pub fn create_or_attach<R: Read + ?Sized>(
        &self,
        guard: &DigestGuard<'_>,
        source: &mut R,
        meta: NewBlob,
    ) -> StoreResult<(Blob, bool)> {
        let digest = *guard.digest();
        if let Some(existing) = self.catalog.get(&digest)? {
            debug!(digest = %digest.short_hex(), "attaching to existing blob");
            return Ok((existing, false));
        }

        let outcome = self.files.write(&digest, source)?;
        let blob = Blob {
            digest,
            original_name: meta.original_name,
            media_type: meta.media_type,
            size_bytes: meta.size_bytes,
            storage_location: BlobFiles::location(&digest),
            reference_count: 0,
            created_at: Utc::now(),
        };

        match self.catalog.insert(blob) {
            Ok(Insertion::Inserted(blob)) => {
                info!(
                    digest = %digest.short_hex(),
                    size = blob.size_bytes,
                    media_type = %blob.media_type,
                    "stored new blob"
                );
                Ok((blob, true))
            }
            Ok(Insertion::Existing(blob)) => Ok((blob, false)),
            Err(e) => {
                if outcome == WriteOutcome::Written {
                    if let Err(cleanup) = self.files.remove(&digest) {
                        warn!(
                            digest = %digest.short_hex(),
                            error = %cleanup,
                            "failed to remove blob file after catalog insert failed"
                        );
                    }
                }
                Err(e)
            }
        }
    }

    /// Increment the guarded digest's reference count.
    pub fn increment_ref(&self, guard: &DigestGuard<'_>) -> StoreResult<u64> {
        self.catalog.increment(guard.digest())
    }

    /// Decrement the guarded digest's reference count.
    pub fn decrement_ref(&self, guard: &DigestGuard<'_>) -> StoreResult<u64> {
        self.catalog.decrement(guard.digest())
    }

    /// Overwrite the guarded digest's reference count.
    pub fn set_reference_count(&self, guard: &DigestGuard<'_>, count: u64) -> StoreResult<()> {
        self.catalog.set_count(guard.digest(), count)
    }

    /// Reclaim the guarded blob if nothing references it.
    ///
    /// Metadata is removed before the bytes. Deleting the bytes first and
    /// then the record reads more naturally, but a crash between the two
    /// would leave a catalogued blob with no bytes, and the next upload of
    /// that content would attach a reference to it. In this order a crash
    /// leaves at worst an uncatalogued file, which
    /// [`remove_orphan_file`](Self::remove_orphan_file) clears.
    ///
    /// Returns the reclaimed record, or `None` if the blob is unknown or
    /// still referenced.
    pub fn reclaim_if_orphaned(&self, guard: &DigestGuard<'_>) -> StoreResult<Option<Blob>> {
        let digest = guard.digest();
        match self.catalog.get(digest)? {
            Some(blob) if blob.is_orphaned() => {}
            _ => return Ok(None),
        }

        let Some(blob) = self.catalog.remove_if_unreferenced(digest)? else {
            return Ok(None);
        };
        self.files.remove(digest)?;
        info!(digest = %digest.short_hex(), size = blob.size_bytes, "reclaimed blob");
        Ok(Some(blob))
    }

    /// Delete the guarded digest's file if the catalog has no record of it.
    pub fn remove_orphan_file(&self, guard: &DigestGuard<'_>) -> StoreResult<bool> {
        let digest = guard.digest();
        if self.catalog.contains(digest)? {
            return Ok(false);
        }
        let removed = self.files.remove(digest)?;
        if removed {
            info!(digest = %digest.short_hex(), "removed orphaned blob file");
        }
        Ok(removed)
    }

    /// Open the stored bytes of a catalogued blob for reading.
    pub fn open_blob(&self, digest: &Digest) -> StoreResult<File> {
        self.get(digest)?;
        self.files.open_read(digest)
    }
}

impl std::fmt::Debug for ContentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentStore")
            .field("files", &self.files)
            .field("locks", &self.locks.stripe_count())
            .finish_non_exhaustive()
    }
}
