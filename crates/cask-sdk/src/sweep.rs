use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use cask_refs::ReferenceRegistry;
use cask_store::{Blob, ContentStore, DigestGuard};
use cask_types::{Digest, ReferenceId};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::SdkResult;

/// What a maintenance sweep found and fixed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub blobs_checked: usize,
    /// Blobs whose count disagreed with the registry and was overwritten.
    pub counts_repaired: usize,
    pub blobs_reclaimed: usize,
    /// Blob files with no catalog entry, removed.
    pub orphan_files_removed: usize,
    pub stale_temp_removed: usize,
    /// References whose blob is missing. Reported, never deleted.
    pub dangling_references: Vec<ReferenceId>,
    /// Catalogued blobs whose bytes are missing.
    pub missing_files: Vec<Digest>,
}

impl SweepReport {
    pub fn is_clean(&self) -> bool {
        self.counts_repaired == 0
            && self.blobs_reclaimed == 0
            && self.orphan_files_removed == 0
            && self.stale_temp_removed == 0
            && self.dangling_references.is_empty()
            && self.missing_files.is_empty()
    }
}

/// Out-of-band repair of everything a best-effort cleanup may have left
/// behind: count drift, orphaned blobs, crash leftovers and stale temp files.
///
/// Each digest is examined under its own lock, so a sweep can run alongside
/// uploads and deletions.
pub struct Sweeper<'a> {
    store: &'a ContentStore,
    registry: &'a dyn ReferenceRegistry,
    temp_grace: Duration,
}

impl<'a> Sweeper<'a> {
    pub fn new(
        store: &'a ContentStore,
        registry: &'a dyn ReferenceRegistry,
        temp_grace: Duration,
    ) -> Self {
        Self {
            store,
            registry,
            temp_grace,
        }
    }

    #[tracing::instrument(skip(self))]
    pub fn run(&self) -> SdkResult<SweepReport> {
        let mut report = SweepReport::default();

        let mut referenced: BTreeMap<Digest, Vec<ReferenceId>> = BTreeMap::new();
        for reference in self.registry.list_all()? {
            referenced.entry(reference.digest).or_default().push(reference.id);
        }
        let mut digests: BTreeSet<Digest> = referenced.keys().copied().collect();
        digests.extend(self.store.list_blobs()?.into_iter().map(|b| b.digest));
        digests.extend(self.store.files().list()?);

        for digest in digests {
            let listed = referenced.get(&digest).map_or(&[][..], Vec::as_slice);
            self.sweep_digest(&digest, listed, &mut report)?;
        }
        // Dangling ids come from the first listing; drop any deleted since.
        report
            .dangling_references
            .retain(|id| matches!(self.registry.get(id), Ok(Some(_))));

        report.stale_temp_removed = self.store.files().remove_stale_temp(self.temp_grace)?;

        if report.is_clean() {
            info!(blobs = report.blobs_checked, "sweep found nothing to repair");
        } else {
            info!(
                blobs = report.blobs_checked,
                repaired = report.counts_repaired,
                reclaimed = report.blobs_reclaimed,
                orphan_files = report.orphan_files_removed,
                stale_temp = report.stale_temp_removed,
                dangling = report.dangling_references.len(),
                missing = report.missing_files.len(),
                "sweep complete"
            );
        }
        Ok(report)
    }

    /// Rewrite every catalogued count that disagrees with the registry.
    ///
    /// Nothing is reclaimed or deleted, so this is safe to run when a store
    /// is opened. Returns the number of counts repaired.
    pub fn reconcile_counts(&self) -> SdkResult<usize> {
        let mut repaired = 0;
        for listed in self.store.list_blobs()? {
            let guard = self.store.lock(&listed.digest);
            let Some(blob) = self.store.find_by_digest(&listed.digest)? else {
                continue;
            };
            if self.repair_count(&guard, &blob)?.1 {
                repaired += 1;
            }
        }
        Ok(repaired)
    }

    /// The registry's count for `blob`, and whether the catalog had to be
    /// overwritten to match it.
    fn repair_count(&self, guard: &DigestGuard<'_>, blob: &Blob) -> SdkResult<(u64, bool)> {
        let actual = self.registry.count_for_digest(&blob.digest)?;
        if blob.reference_count == actual {
            return Ok((actual, false));
        }
        warn!(
            digest = %blob.digest.short_hex(),
            recorded = blob.reference_count,
            actual,
            "repairing reference count"
        );
        self.store.set_reference_count(guard, actual)?;
        Ok((actual, true))
    }

    fn sweep_digest(
        &self,
        digest: &Digest,
        listed: &[ReferenceId],
        report: &mut SweepReport,
    ) -> SdkResult<()> {
        let guard = self.store.lock(digest);

        let Some(blob) = self.store.find_by_digest(digest)? else {
            if self.store.remove_orphan_file(&guard)? {
                report.orphan_files_removed += 1;
            }
            if !listed.is_empty() {
                warn!(digest = %digest.short_hex(), count = listed.len(), "references to a missing blob");
                report.dangling_references.extend_from_slice(listed);
            }
            return Ok(());
        };

        report.blobs_checked += 1;
        if !self.store.files().contains(digest) {
            warn!(digest = %digest.short_hex(), "blob bytes are missing");
            report.missing_files.push(*digest);
        }

        let (actual, repaired) = self.repair_count(&guard, &blob)?;
        if repaired {
            report.counts_repaired += 1;
        }
        if actual == 0 && self.store.reclaim_if_orphaned(&guard)?.is_some() {
            report.blobs_reclaimed += 1;
        }
        Ok(())
    }
}
