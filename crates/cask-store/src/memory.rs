use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use cask_types::Digest;
use serde::{Deserialize, Serialize};

use crate::blob::Blob;
use crate::error::{StoreError, StoreResult};
use crate::traits::{BlobCatalog, Insertion};

/// The catalog table shared by the in-memory and file-backed catalogs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct BlobTable {
    blobs: BTreeMap<Digest, Blob>,
}

impl BlobTable {
    pub(crate) fn get(&self, digest: &Digest) -> Option<Blob> {
        self.blobs.get(digest).cloned()
    }

    pub(crate) fn insert(&mut self, blob: Blob) -> Insertion {
        if let Some(existing) = self.blobs.get(&blob.digest) {
            return Insertion::Existing(existing.clone());
        }
        self.blobs.insert(blob.digest, blob.clone());
        Insertion::Inserted(blob)
    }

    pub(crate) fn increment(&mut self, digest: &Digest) -> StoreResult<u64> {
        let blob = self
            .blobs
            .get_mut(digest)
            .ok_or(StoreError::NotFound(*digest))?;
        blob.reference_count += 1;
        Ok(blob.reference_count)
    }

    pub(crate) fn decrement(&mut self, digest: &Digest) -> StoreResult<u64> {
        let blob = self
            .blobs
            .get_mut(digest)
            .ok_or(StoreError::NotFound(*digest))?;
        blob.reference_count = blob
            .reference_count
            .checked_sub(1)
            .ok_or(StoreError::CounterUnderflow(*digest))?;
        Ok(blob.reference_count)
    }

    pub(crate) fn set_count(&mut self, digest: &Digest, count: u64) -> StoreResult<()> {
        let blob = self
            .blobs
            .get_mut(digest)
            .ok_or(StoreError::NotFound(*digest))?;
        blob.reference_count = count;
        Ok(())
    }

    pub(crate) fn remove_if_unreferenced(&mut self, digest: &Digest) -> StoreResult<Option<Blob>> {
        match self.blobs.get(digest) {
            None => Ok(None),
            Some(blob) if blob.reference_count > 0 => Err(StoreError::StillReferenced {
                digest: *digest,
                count: blob.reference_count,
            }),
            Some(_) => Ok(self.blobs.remove(digest)),
        }
    }

    pub(crate) fn list(&self) -> Vec<Blob> {
        self.blobs.values().cloned().collect()
    }

    pub(crate) fn get_many(&self, digests: &[Digest]) -> Vec<Option<Blob>> {
        digests.iter().map(|d| self.get(d)).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.blobs.len()
    }

    pub(crate) fn total_bytes(&self) -> u64 {
        self.blobs.values().map(|b| b.size_bytes).sum()
    }
}

/// In-memory blob catalog.
///
/// Intended for tests and embedding. Records live in a `BTreeMap` behind a
/// `RwLock`; every operation takes the lock once, which is what makes the
/// counter operations atomic.
#[derive(Debug, Default)]
pub struct InMemoryBlobCatalog {
    table: RwLock<BlobTable>,
}

impl InMemoryBlobCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blobs currently recorded.
    pub fn len(&self) -> usize {
        self.read().map(|t| t.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total bytes across all recorded blobs.
    pub fn total_bytes(&self) -> u64 {
        self.read().map(|t| t.total_bytes()).unwrap_or(0)
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, BlobTable>> {
        self.table.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, BlobTable>> {
        self.table.write().map_err(|_| StoreError::LockPoisoned)
    }
}

impl BlobCatalog for InMemoryBlobCatalog {
    fn get(&self, digest: &Digest) -> StoreResult<Option<Blob>> {
        Ok(self.read()?.get(digest))
    }

    fn insert(&self, blob: Blob) -> StoreResult<Insertion> {
        Ok(self.write()?.insert(blob))
    }

    fn increment(&self, digest: &Digest) -> StoreResult<u64> {
        self.write()?.increment(digest)
    }

    fn decrement(&self, digest: &Digest) -> StoreResult<u64> {
        self.write()?.decrement(digest)
    }

    fn set_count(&self, digest: &Digest, count: u64) -> StoreResult<()> {
        self.write()?.set_count(digest, count)
    }

    fn remove_if_unreferenced(&self, digest: &Digest) -> StoreResult<Option<Blob>> {
        self.write()?.remove_if_unreferenced(digest)
    }

    fn list(&self) -> StoreResult<Vec<Blob>> {
        Ok(self.read()?.list())
    }

    fn get_many(&self, digests: &[Digest]) -> StoreResult<Vec<Option<Blob>>> {
        Ok(self.read()?.get_many(digests))
    }
}
