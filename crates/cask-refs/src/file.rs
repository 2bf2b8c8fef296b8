//! File-backed reference registry.
//!
//! [`FileReferenceRegistry`] persists its whole table through a
//! [`SnapshotFile`] after every mutation. A mutation is applied to a copy of
//! the table first; the copy replaces the live table only once it is on
//! disk.

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use cask_store::SnapshotFile;
use cask_types::{Digest, OwnerId, ReferenceId};
use tracing::info;

use crate::error::{RefError, Result};
use crate::memory::ReferenceTable;
use crate::traits::ReferenceRegistry;
use crate::types::{NewReference, Reference};

#[derive(Debug)]
pub struct FileReferenceRegistry {
    table: Mutex<ReferenceTable>,
    snapshot: SnapshotFile,
}

impl FileReferenceRegistry {
    /// Open the registry at `path`, starting empty if no snapshot exists.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let snapshot = SnapshotFile::new(path);
        let table = snapshot.load::<ReferenceTable>()?.unwrap_or_default();
        info!(path = ?snapshot.path(), references = table.len(), "opened reference registry");
        Ok(Self {
            table: Mutex::new(table),
            snapshot,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, ReferenceTable>> {
        self.table.lock().map_err(|_| RefError::LockPoisoned)
    }

    fn commit<T>(&self, op: impl FnOnce(&mut ReferenceTable) -> Result<T>) -> Result<T> {
        let mut table = self.lock()?;
        let mut next = table.clone();
        let out = op(&mut next)?;
        self.snapshot.save(&next)?;
        *table = next;
        Ok(out)
    }
}

impl ReferenceRegistry for FileReferenceRegistry {
    fn find_by_owner_and_digest(
        &self,
        owner: &OwnerId,
        digest: &Digest,
    ) -> Result<Option<Reference>> {
        Ok(self.lock()?.find(owner, digest))
    }

    fn get(&self, id: &ReferenceId) -> Result<Option<Reference>> {
        Ok(self.lock()?.get(id))
    }

    fn create(&self, new: NewReference) -> Result<Reference> {
        self.commit(|t| t.create(new))
    }

    fn delete(&self, id: &ReferenceId, owner: &OwnerId) -> Result<Reference> {
        self.commit(|t| t.delete(id, owner))
    }

    fn list_by_owner(&self, owner: &OwnerId) -> Result<Vec<Reference>> {
        Ok(self.lock()?.list_by_owner(owner))
    }

    fn count_for_digest(&self, digest: &Digest) -> Result<u64> {
        Ok(self.lock()?.count_for_digest(digest))
    }

    fn list_all(&self) -> Result<Vec<Reference>> {
        Ok(self.lock()?.list_all())
    }
}
