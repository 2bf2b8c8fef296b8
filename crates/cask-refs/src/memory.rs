//! In-memory reference registry for testing and embedding.
//!
//! [`InMemoryReferenceRegistry`] keeps every reference in a table behind a
//! `RwLock`. The same table type backs the file-backed registry.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use cask_types::{Digest, OwnerId, ReferenceId};
use serde::{Deserialize, Serialize};

use crate::error::{RefError, Result};
use crate::names::validate_display_name;
use crate::traits::ReferenceRegistry;
use crate::types::{NewReference, Reference};

/// References by id, with a unique (owner, digest) index.
///
/// Only the records are serialized; the index is rebuilt on load.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Reference>", into = "Vec<Reference>")]
pub(crate) struct ReferenceTable {
    by_id: BTreeMap<ReferenceId, Reference>,
    by_owner_digest: BTreeMap<(OwnerId, Digest), ReferenceId>,
}

impl From<Vec<Reference>> for ReferenceTable {
    fn from(records: Vec<Reference>) -> Self {
        let mut table = Self::default();
        for reference in records {
            table
                .by_owner_digest
                .insert((reference.owner.clone(), reference.digest), reference.id);
            table.by_id.insert(reference.id, reference);
        }
        table
    }
}

impl From<ReferenceTable> for Vec<Reference> {
    fn from(table: ReferenceTable) -> Self {
        table.by_id.into_values().collect()
    }
}

impl ReferenceTable {
    pub(crate) fn find(&self, owner: &OwnerId, digest: &Digest) -> Option<Reference> {
        self.by_owner_digest
            .get(&(owner.clone(), *digest))
            .and_then(|id| self.by_id.get(id))
            .cloned()
    }

    pub(crate) fn get(&self, id: &ReferenceId) -> Option<Reference> {
        self.by_id.get(id).cloned()
    }

    pub(crate) fn create(&mut self, new: NewReference) -> Result<Reference> {
        validate_display_name(&new.display_name)?;

        let key = (new.owner.clone(), new.digest);
        if let Some(existing) = self.by_owner_digest.get(&key) {
            return Err(RefError::DuplicateReference {
                owner: new.owner,
                digest: new.digest,
                existing: *existing,
            });
        }

        let reference = new.into_reference();
        self.by_owner_digest.insert(key, reference.id);
        self.by_id.insert(reference.id, reference.clone());
        Ok(reference)
    }

    pub(crate) fn delete(&mut self, id: &ReferenceId, owner: &OwnerId) -> Result<Reference> {
        match self.by_id.get(id) {
            None => return Err(RefError::NotFound(*id)),
            Some(existing) if existing.owner != *owner => {
                return Err(RefError::Forbidden { id: *id })
            }
            Some(_) => {}
        }
        let reference = self.by_id.remove(id).ok_or(RefError::NotFound(*id))?;
        self.by_owner_digest
            .remove(&(reference.owner.clone(), reference.digest));
        Ok(reference)
    }

    pub(crate) fn list_by_owner(&self, owner: &OwnerId) -> Vec<Reference> {
        let mut refs: Vec<Reference> = self
            .by_id
            .values()
            .filter(|r| r.owner == *owner)
            .cloned()
            .collect();
        refs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        refs
    }

    pub(crate) fn count_for_digest(&self, digest: &Digest) -> u64 {
        self.by_id.values().filter(|r| r.digest == *digest).count() as u64
    }

    pub(crate) fn list_all(&self) -> Vec<Reference> {
        self.by_id.values().cloned().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.by_id.len()
    }
}

/// An in-memory implementation of [`ReferenceRegistry`].
///
/// Data is lost when the registry is dropped.
#[derive(Debug, Default)]
pub struct InMemoryReferenceRegistry {
    table: RwLock<ReferenceTable>,
}

impl InMemoryReferenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.read().map(|t| t.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, ReferenceTable>> {
        self.table.read().map_err(|_| RefError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, ReferenceTable>> {
        self.table.write().map_err(|_| RefError::LockPoisoned)
    }
}

impl ReferenceRegistry for InMemoryReferenceRegistry {
    fn find_by_owner_and_digest(
        &self,
        owner: &OwnerId,
        digest: &Digest,
    ) -> Result<Option<Reference>> {
        Ok(self.read()?.find(owner, digest))
    }

    fn get(&self, id: &ReferenceId) -> Result<Option<Reference>> {
        Ok(self.read()?.get(id))
    }

    fn create(&self, new: NewReference) -> Result<Reference> {
        self.write()?.create(new)
    }

    fn delete(&self, id: &ReferenceId, owner: &OwnerId) -> Result<Reference> {
        self.write()?.delete(id, owner)
    }

    fn list_by_owner(&self, owner: &OwnerId) -> Result<Vec<Reference>> {
        Ok(self.read()?.list_by_owner(owner))
    }

    fn count_for_digest(&self, digest: &Digest) -> Result<u64> {
        Ok(self.read()?.count_for_digest(digest))
    }

    fn list_all(&self) -> Result<Vec<Reference>> {
        Ok(self.read()?.list_all())
    }
}
