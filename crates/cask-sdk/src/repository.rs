use std::fs::{self, File};
use std::io::{Read, Seek};
use std::sync::Arc;

use cask_refs::{FileReferenceRegistry, InMemoryReferenceRegistry, ReferenceRegistry};
use cask_store::{
    BlobCatalog, BlobFiles, ContentStore, DigestLocks, FileBlobCatalog, InMemoryBlobCatalog,
};
use cask_types::{OwnerId, ReferenceId};
use tracing::{info, warn};

use crate::config::CaskConfig;
use crate::delete::{DeleteOutcome, DeletionOrchestrator};
use crate::error::{SdkError, SdkResult};
use crate::stats::{StatsAggregator, StorageStats};
use crate::sweep::{SweepReport, Sweeper};
use crate::upload::{UploadOrchestrator, UploadRequest, UploadResult};
use crate::view::{owner_views, BlobSummary, ReferenceView};

/// High-level cask API: one store root, shared by every caller.
///
/// `Cask` is `Send + Sync`; wrap it in an `Arc` to share it across threads.
pub struct Cask {
    config: CaskConfig,
    store: Arc<ContentStore>,
    registry: Arc<dyn ReferenceRegistry>,
    uploads: UploadOrchestrator,
    deletions: DeletionOrchestrator,
}

impl Cask {
    /// Open (or create) the durable store under `config.root`.
    pub fn open(config: CaskConfig) -> SdkResult<Self> {
        config.validate()?;
        fs::create_dir_all(&config.root)?;
        let catalog = FileBlobCatalog::open(config.catalog_path())?;
        let registry = FileReferenceRegistry::open(config.references_path())?;
        let cask = Self::with_parts(config, Box::new(catalog), Arc::new(registry))?;
        // The two snapshots are written separately; a crash between them
        // leaves counts that disagree with the registry.
        let repaired = Sweeper::new(&cask.store, cask.registry.as_ref(), cask.config.temp_grace())
            .reconcile_counts()?;
        if repaired > 0 {
            warn!(repaired, "reference counts repaired from the registry");
        }
        info!(root = ?cask.config.root, "opened cask");
        Ok(cask)
    }

    /// Keep metadata in memory; blob bytes still go under `config.root`.
    pub fn in_memory(config: CaskConfig) -> SdkResult<Self> {
        Self::with_parts(
            config,
            Box::new(InMemoryBlobCatalog::new()),
            Arc::new(InMemoryReferenceRegistry::new()),
        )
    }

    /// Assemble a cask from caller-supplied metadata backends.
    pub fn with_parts(
        config: CaskConfig,
        catalog: Box<dyn BlobCatalog>,
        registry: Arc<dyn ReferenceRegistry>,
    ) -> SdkResult<Self> {
        config.validate()?;
        let files = BlobFiles::open(&config.root)?;
        let store = Arc::new(ContentStore::new(
            catalog,
            files,
            DigestLocks::new(config.lock_stripes),
        ));
        let uploads =
            UploadOrchestrator::new(config.inspector()?, Arc::clone(&store), Arc::clone(&registry));
        let deletions = DeletionOrchestrator::new(Arc::clone(&store), Arc::clone(&registry));
        Ok(Self {
            config,
            store,
            registry,
            uploads,
            deletions,
        })
    }

    pub fn config(&self) -> &CaskConfig {
        &self.config
    }

    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    pub fn registry(&self) -> &dyn ReferenceRegistry {
        self.registry.as_ref()
    }

    // ---- Owner operations ----

    pub fn upload<R: Read + Seek>(
        &self,
        request: UploadRequest,
        source: &mut R,
    ) -> SdkResult<UploadResult> {
        self.uploads.upload(request, source)
    }

    /// The owner's references, newest first, each with its blob summary.
    pub fn list_references(&self, owner: &OwnerId) -> SdkResult<Vec<ReferenceView>> {
        owner_views(&self.store, self.registry.as_ref(), owner)
    }

    pub fn delete_reference(
        &self,
        owner: &OwnerId,
        id: &ReferenceId,
    ) -> SdkResult<DeleteOutcome> {
        self.deletions.delete(id, owner)
    }

    pub fn get_stats(&self, owner: &OwnerId) -> SdkResult<StorageStats> {
        StatsAggregator::new(&self.store, self.registry.as_ref()).stats_for(owner)
    }

    /// Open a reference's bytes for reading.
    ///
    /// Private references are readable by their owner only; anyone may read
    /// a public one.
    pub fn open_reference(
        &self,
        reader: &OwnerId,
        id: &ReferenceId,
    ) -> SdkResult<(ReferenceView, File)> {
        let reference = self.registry.get(id)?.ok_or(SdkError::NotFound(*id))?;
        if reference.is_private && reference.owner != *reader {
            return Err(SdkError::Forbidden(*id));
        }
        let blob = self.store.find_by_digest(&reference.digest)?.ok_or_else(|| {
            SdkError::Internal(format!("reference {id} points at a missing blob"))
        })?;
        let file = self.store.files().open_read(&reference.digest)?;
        Ok((
            ReferenceView {
                blob: BlobSummary::from(&blob),
                reference,
            },
            file,
        ))
    }

    // ---- Maintenance ----

    pub fn sweep(&self) -> SdkResult<SweepReport> {
        Sweeper::new(&self.store, self.registry.as_ref(), self.config.temp_grace()).run()
    }
}

impl std::fmt::Debug for Cask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cask")
            .field("root", &self.config.root)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use cask_types::MediaType;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use std::io::Cursor;
    use std::thread;

    fn owner(name: &str) -> OwnerId {
        OwnerId::new(name).unwrap()
    }

    fn open(dir: &tempfile::TempDir) -> Cask {
        Cask::open(CaskConfig::at(dir.path())).unwrap()
    }

    fn put(cask: &Cask, who: &str, name: &str, data: &[u8]) -> UploadResult {
        cask.upload(UploadRequest::new(owner(who), name), &mut Cursor::new(data.to_vec()))
            .unwrap()
    }

    #[test]
    fn open_creates_layout() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("nested").join("root");
        let cask = Cask::open(CaskConfig::at(&root)).unwrap();
        assert!(root.join("blobs").is_dir());
        assert!(root.join("tmp").is_dir());
        assert_eq!(cask.config().root, root);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = CaskConfig::at(dir.path());
        config.lock_stripes = 0;
        let err = Cask::open(config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    // ---- Upload / list / delete ----

    #[test]
    fn full_lifecycle_across_two_owners() {
        let dir = tempfile::tempdir().unwrap();
        let cask = open(&dir);
        let data = b"the same report, twice";

        let alice = put(&cask, "alice", "report.txt", data);
        let bob = put(&cask, "bob", "copy.txt", data);
        assert!(!alice.was_duplicate);
        assert!(bob.was_duplicate);
        assert_eq!(cask.store().files().list().unwrap().len(), 1);

        cask.delete_reference(&owner("alice"), &alice.reference.id).unwrap();
        assert!(cask.store().files().contains(&alice.blob.digest));
        let outcome = cask.delete_reference(&owner("bob"), &bob.reference.id).unwrap();
        assert!(outcome.reclaimed);
        assert!(cask.store().files().list().unwrap().is_empty());
        assert!(cask.store().list_blobs().unwrap().is_empty());
    }

    #[test]
    fn list_is_newest_first_with_blob_summary() {
        let dir = tempfile::tempdir().unwrap();
        let cask = open(&dir);
        put(&cask, "alice", "first.txt", b"first");
        put(&cask, "alice", "second.txt", b"second");
        put(&cask, "bob", "other.txt", b"other");

        let views = cask.list_references(&owner("alice")).unwrap();
        let names: Vec<_> = views.iter().map(|v| v.reference.display_name.as_str()).collect();
        assert_eq!(names, ["second.txt", "first.txt"]);
        assert_eq!(views[0].blob.size_bytes, 6);
        assert_eq!(views[0].blob.reference_count, 1);
        assert_eq!(views[0].blob.media_type.as_str(), "text/plain");
    }

    #[test]
    fn state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let up = {
            let cask = open(&dir);
            put(&cask, "alice", "kept.txt", b"persisted")
        };

        let cask = open(&dir);
        let views = cask.list_references(&owner("alice")).unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].reference.id, up.reference.id);
        assert_eq!(views[0].blob.reference_count, 1);

        let again = put(&cask, "alice", "kept.txt", b"persisted");
        assert!(again.was_duplicate);
        assert_eq!(again.reference.id, up.reference.id);
    }

    #[test]
    fn reopen_repairs_counts_behind_the_registry() {
        let dir = tempfile::tempdir().unwrap();
        let data = b"alice keeps this";
        let alice = {
            let cask = open(&dir);
            let alice = put(&cask, "alice", "a.txt", data);
            // Reference persisted, increment lost.
            let guard = cask.store().lock(&alice.blob.digest);
            cask.store().set_reference_count(&guard, 0).unwrap();
            alice
        };

        let cask = open(&dir);
        let views = cask.list_references(&owner("alice")).unwrap();
        assert_eq!(views[0].blob.reference_count, 1);

        let bob = put(&cask, "bob", "b.txt", data);
        assert_eq!(bob.blob.reference_count, 2);
        let outcome = cask.delete_reference(&owner("bob"), &bob.reference.id).unwrap();
        assert!(!outcome.reclaimed);

        let (view, mut file) = cask.open_reference(&owner("alice"), &alice.reference.id).unwrap();
        assert_eq!(view.blob.reference_count, 1);
        let mut body = Vec::new();
        file.read_to_end(&mut body).unwrap();
        assert_eq!(body, data);
    }

    #[test]
    fn declared_type_is_checked() {
        let dir = tempfile::tempdir().unwrap();
        let cask = open(&dir);
        let err = cask
            .upload(
                UploadRequest::new(owner("alice"), "x.png").declared(MediaType::from_static("image/png")),
                &mut Cursor::new(b"just text".to_vec()),
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(cask.list_references(&owner("alice")).unwrap().is_empty());
    }

    #[test]
    fn delete_checks_ownership_and_existence() {
        let dir = tempfile::tempdir().unwrap();
        let cask = open(&dir);
        let up = put(&cask, "alice", "a.txt", b"alice only");

        let forbidden = cask.delete_reference(&owner("bob"), &up.reference.id).unwrap_err();
        assert_eq!(forbidden.kind(), ErrorKind::Forbidden);
        let missing = cask.delete_reference(&owner("alice"), &ReferenceId::new()).unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn private_references_are_owner_readable_only() {
        let dir = tempfile::tempdir().unwrap();
        let cask = open(&dir);
        let private = put(&cask, "alice", "secret.txt", b"for alice");
        let public = cask
            .upload(
                UploadRequest::new(owner("alice"), "shared.txt").private(false),
                &mut Cursor::new(b"for everyone".to_vec()),
            )
            .unwrap();

        let (_, mut file) = cask.open_reference(&owner("alice"), &private.reference.id).unwrap();
        let mut body = String::new();
        file.read_to_string(&mut body).unwrap();
        assert_eq!(body, "for alice");

        let err = cask.open_reference(&owner("bob"), &private.reference.id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let (view, _) = cask.open_reference(&owner("bob"), &public.reference.id).unwrap();
        assert!(!view.reference.is_private);
    }

    // ---- Concurrency ----

    #[test]
    fn concurrent_identical_uploads_store_once() {
        const OWNERS: usize = 12;
        let dir = tempfile::tempdir().unwrap();
        let cask = Arc::new(open(&dir));
        let data = b"everyone uploads this at once".to_vec();

        let handles: Vec<_> = (0..OWNERS)
            .map(|i| {
                let cask = Arc::clone(&cask);
                let data = data.clone();
                thread::spawn(move || {
                    cask.upload(
                        UploadRequest::new(owner(&format!("owner-{i}")), "same.txt"),
                        &mut Cursor::new(data),
                    )
                    .unwrap()
                })
            })
            .collect();
        let results: Vec<UploadResult> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|r| !r.was_duplicate).count(), 1);
        let digest = results[0].blob.digest;
        assert_eq!(cask.store().get(&digest).unwrap().reference_count, OWNERS as u64);
        assert_eq!(cask.registry().count_for_digest(&digest).unwrap(), OWNERS as u64);
        assert_eq!(cask.store().files().list().unwrap(), vec![digest]);
    }

    #[test]
    fn concurrent_deletes_reclaim_exactly_once() {
        const OWNERS: usize = 8;
        let dir = tempfile::tempdir().unwrap();
        let cask = Arc::new(open(&dir));
        let refs: Vec<_> = (0..OWNERS)
            .map(|i| {
                let who = format!("owner-{i}");
                (owner(&who), put(&cask, &who, "f.txt", b"shared then dropped").reference.id)
            })
            .collect();

        let handles: Vec<_> = refs
            .into_iter()
            .map(|(who, id)| {
                let cask = Arc::clone(&cask);
                thread::spawn(move || cask.delete_reference(&who, &id).unwrap())
            })
            .collect();
        let reclaimed = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|o| o.reclaimed)
            .count();

        assert_eq!(reclaimed, 1);
        assert!(cask.store().list_blobs().unwrap().is_empty());
        assert!(cask.store().files().list().unwrap().is_empty());
        assert!(cask.sweep().unwrap().is_clean());
    }

    // ---- Stats ----

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn upload_savings_add_up_to_stats(picks in prop::collection::vec((0usize..2, 0usize..4), 1..16)) {
            const POOL: [&[u8]; 4] = [b"alpha", b"bravo bravo", b"charlie!", b"delta delta delta"];
            let dir = tempfile::tempdir().unwrap();
            let cask = Cask::in_memory(CaskConfig::at(dir.path())).unwrap();

            // Only uploads that create a reference count towards the stats.
            let mut seen = HashSet::new();
            let mut saved = [0u64; 2];
            for (who, pick) in picks {
                let result = put(&cask, ["alice", "bob"][who], "f", POOL[pick]);
                if seen.insert(result.reference.id) {
                    saved[who] += result.saved_bytes;
                }
            }
            for (who, name) in ["alice", "bob"].iter().enumerate() {
                let stats = cask.get_stats(&owner(name)).unwrap();
                prop_assert_eq!(&stats, &cask.get_stats(&owner(name)).unwrap());
                prop_assert_eq!(stats.duplicate_count, stats.total_references - stats.distinct_count);
                prop_assert_eq!(saved[who], stats.saved_bytes);
                prop_assert_eq!(stats.saved_bytes, stats.total_size - stats.actual_size);
            }
        }
    }
}
