//! Shared test scaffolding: a store over a temp dir with fault injection on
//! both the catalog and the registry.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cask_hash::Inspector;
use cask_refs::{
    InMemoryReferenceRegistry, NewReference, RefError, Reference, ReferenceRegistry, Result,
};
use cask_store::{
    Blob, BlobCatalog, BlobFiles, ContentStore, DigestLocks, InMemoryBlobCatalog, Insertion,
    StoreError, StoreResult,
};
use cask_types::{Digest, OwnerId, ReferenceId};

use crate::delete::DeletionOrchestrator;
use crate::upload::UploadOrchestrator;

pub(crate) fn owner(name: &str) -> OwnerId {
    OwnerId::new(name).unwrap()
}

fn injected() -> StoreError {
    StoreError::Io(io::Error::other("injected fault"))
}

// ---------------------------------------------------------------------------
// Catalog faults
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub(crate) struct CatalogFaults {
    increment: AtomicBool,
    decrement: AtomicBool,
    remove: AtomicBool,
}

impl CatalogFaults {
    pub(crate) fn fail_increment(&self, on: bool) {
        self.increment.store(on, Ordering::SeqCst);
    }

    pub(crate) fn fail_decrement(&self, on: bool) {
        self.decrement.store(on, Ordering::SeqCst);
    }

    pub(crate) fn fail_remove(&self, on: bool) {
        self.remove.store(on, Ordering::SeqCst);
    }
}

struct FlakyCatalog {
    inner: InMemoryBlobCatalog,
    faults: Arc<CatalogFaults>,
}

impl BlobCatalog for FlakyCatalog {
    fn get(&self, digest: &Digest) -> StoreResult<Option<Blob>> {
        self.inner.get(digest)
    }

    fn insert(&self, blob: Blob) -> StoreResult<Insertion> {
        self.inner.insert(blob)
    }

    fn increment(&self, digest: &Digest) -> StoreResult<u64> {
        if self.faults.increment.load(Ordering::SeqCst) {
            return Err(injected());
        }
        self.inner.increment(digest)
    }

    fn decrement(&self, digest: &Digest) -> StoreResult<u64> {
        if self.faults.decrement.load(Ordering::SeqCst) {
            return Err(injected());
        }
        self.inner.decrement(digest)
    }

    fn set_count(&self, digest: &Digest, count: u64) -> StoreResult<()> {
        self.inner.set_count(digest, count)
    }

    fn remove_if_unreferenced(&self, digest: &Digest) -> StoreResult<Option<Blob>> {
        if self.faults.remove.load(Ordering::SeqCst) {
            return Err(injected());
        }
        self.inner.remove_if_unreferenced(digest)
    }

    fn list(&self) -> StoreResult<Vec<Blob>> {
        self.inner.list()
    }
}

// ---------------------------------------------------------------------------
// Registry faults
// ---------------------------------------------------------------------------

#[derive(Default)]
pub(crate) struct FlakyRegistry {
    inner: InMemoryReferenceRegistry,
    fail_create: AtomicBool,
    fail_delete: AtomicBool,
}

impl FlakyRegistry {
    pub(crate) fn fail_create(&self, on: bool) {
        self.fail_create.store(on, Ordering::SeqCst);
    }

    pub(crate) fn fail_delete(&self, on: bool) {
        self.fail_delete.store(on, Ordering::SeqCst);
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.len()
    }

    /// Store a reference without touching any blob count.
    pub(crate) fn plant(&self, new: NewReference) -> Reference {
        self.inner.create(new).unwrap()
    }
}

impl ReferenceRegistry for FlakyRegistry {
    fn find_by_owner_and_digest(
        &self,
        owner: &OwnerId,
        digest: &Digest,
    ) -> Result<Option<Reference>> {
        self.inner.find_by_owner_and_digest(owner, digest)
    }

    fn get(&self, id: &ReferenceId) -> Result<Option<Reference>> {
        self.inner.get(id)
    }

    fn create(&self, new: NewReference) -> Result<Reference> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(RefError::Store(injected()));
        }
        self.inner.create(new)
    }

    fn delete(&self, id: &ReferenceId, owner: &OwnerId) -> Result<Reference> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(RefError::Store(injected()));
        }
        self.inner.delete(id, owner)
    }

    fn list_by_owner(&self, owner: &OwnerId) -> Result<Vec<Reference>> {
        self.inner.list_by_owner(owner)
    }

    fn count_for_digest(&self, digest: &Digest) -> Result<u64> {
        self.inner.count_for_digest(digest)
    }

    fn list_all(&self) -> Result<Vec<Reference>> {
        self.inner.list_all()
    }
}

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

pub(crate) struct Env {
    pub(crate) _dir: tempfile::TempDir,
    pub(crate) store: Arc<ContentStore>,
    pub(crate) registry: Arc<FlakyRegistry>,
    pub(crate) catalog: Arc<CatalogFaults>,
}

impl Env {
    pub(crate) fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Arc::new(CatalogFaults::default());
        let store = ContentStore::new(
            Box::new(FlakyCatalog {
                inner: InMemoryBlobCatalog::new(),
                faults: Arc::clone(&catalog),
            }),
            BlobFiles::open(dir.path()).unwrap(),
            DigestLocks::new(8),
        );
        Self {
            _dir: dir,
            store: Arc::new(store),
            registry: Arc::new(FlakyRegistry::default()),
            catalog,
        }
    }

    pub(crate) fn registry_handle(&self) -> Arc<dyn ReferenceRegistry> {
        Arc::clone(&self.registry) as Arc<dyn ReferenceRegistry>
    }

    pub(crate) fn uploads(&self) -> UploadOrchestrator {
        UploadOrchestrator::new(
            Inspector::default(),
            Arc::clone(&self.store),
            self.registry_handle(),
        )
    }

    pub(crate) fn deletions(&self) -> DeletionOrchestrator {
        DeletionOrchestrator::new(Arc::clone(&self.store), self.registry_handle())
    }

    /// No references, no blob records, no blob files, no temp files.
    pub(crate) fn assert_empty(&self) {
        assert_eq!(self.registry.len(), 0, "references left behind");
        assert!(self.store.list_blobs().unwrap().is_empty(), "blob records left behind");
        assert!(self.store.files().list().unwrap().is_empty(), "blob files left behind");
        let temps = std::fs::read_dir(self.store.files().tmp_dir()).unwrap().count();
        assert_eq!(temps, 0, "temp files left behind");
    }
}
