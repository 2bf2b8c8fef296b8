use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use cask_types::Digest;
use tracing::info;

use crate::blob::Blob;
use crate::error::{StoreError, StoreResult};
use crate::memory::BlobTable;
use crate::snapshot::SnapshotFile;
use crate::traits::{BlobCatalog, Insertion};

/// Durable blob catalog backed by a [`SnapshotFile`].
///
/// Every mutation is applied to a copy of the table, the copy is saved, and
/// only then does it replace the in-memory table. A failed save leaves both
/// the file and memory at the previous state.
#[derive(Debug)]
pub struct FileBlobCatalog {
    table: Mutex<BlobTable>,
    snapshot: SnapshotFile,
}

impl FileBlobCatalog {
    /// Open the catalog at `path`, starting empty if no snapshot exists.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let snapshot = SnapshotFile::new(path);
        let table = snapshot.load::<BlobTable>()?.unwrap_or_default();
        info!(path = ?snapshot.path(), blobs = table.len(), "opened blob catalog");
        Ok(Self {
            table: Mutex::new(table),
            snapshot,
        })
    }

    pub fn snapshot(&self) -> &SnapshotFile {
        &self.snapshot
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, BlobTable>> {
        self.table.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn commit<T>(&self, op: impl FnOnce(&mut BlobTable) -> StoreResult<T>) -> StoreResult<T> {
        let mut table = self.lock()?;
        let mut next = table.clone();
        let out = op(&mut next)?;
        if next != *table {
            self.snapshot.save(&next)?;
            *table = next;
        }
        Ok(out)
    }
}

impl BlobCatalog for FileBlobCatalog {
    fn get(&self, digest: &Digest) -> StoreResult<Option<Blob>> {
        Ok(self.lock()?.get(digest))
    }

    fn insert(&self, blob: Blob) -> StoreResult<Insertion> {
        self.commit(|t| Ok(t.insert(blob)))
    }

    fn increment(&self, digest: &Digest) -> StoreResult<u64> {
        self.commit(|t| t.increment(digest))
    }

    fn decrement(&self, digest: &Digest) -> StoreResult<u64> {
        self.commit(|t| t.decrement(digest))
    }

    fn set_count(&self, digest: &Digest, count: u64) -> StoreResult<()> {
        self.commit(|t| t.set_count(digest, count))
    }

    fn remove_if_unreferenced(&self, digest: &Digest) -> StoreResult<Option<Blob>> {
        self.commit(|t| t.remove_if_unreferenced(digest))
    }

    fn list(&self) -> StoreResult<Vec<Blob>> {
        Ok(self.lock()?.list())
    }

    fn get_many(&self, digests: &[Digest]) -> StoreResult<Vec<Option<Blob>>> {
        Ok(self.lock()?.get_many(digests))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cask_hash::ContentHasher;
    use crate::memory::tests::make_blob;
    use std::fs;

    #[test]
    fn state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.snapshot");
        let blob = make_blob(b"durable");

        {
            let catalog = FileBlobCatalog::open(&path).unwrap();
            catalog.insert(blob.clone()).unwrap();
            catalog.increment(&blob.digest).unwrap();
            catalog.increment(&blob.digest).unwrap();
        }

        let reopened = FileBlobCatalog::open(&path).unwrap();
        let stored = reopened.get(&blob.digest).unwrap().unwrap();
        assert_eq!(stored.reference_count, 2);
        assert_eq!(stored.original_name, blob.original_name);
    }

    #[test]
    fn failed_operation_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.snapshot");
        let catalog = FileBlobCatalog::open(&path).unwrap();

        let err = catalog.decrement(&ContentHasher::BLOB.hash(b"nothing")).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert!(!path.exists());
    }

    #[test]
    fn removal_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.snapshot");
        let blob = make_blob(b"short-lived");
        {
            let catalog = FileBlobCatalog::open(&path).unwrap();
            catalog.insert(blob.clone()).unwrap();
            catalog.remove_if_unreferenced(&blob.digest).unwrap();
        }
        let reopened = FileBlobCatalog::open(&path).unwrap();
        assert!(reopened.list().unwrap().is_empty());
    }

    #[test]
    fn corrupt_snapshot_refuses_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.snapshot");
        fs::write(&path, b"definitely not a snapshot").unwrap();
        assert!(matches!(
            FileBlobCatalog::open(&path),
            Err(StoreError::CorruptSnapshot { .. })
        ));
    }
}
