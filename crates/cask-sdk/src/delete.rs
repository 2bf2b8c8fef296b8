use std::sync::Arc;

use cask_refs::{Reference, ReferenceRegistry};
use cask_store::{ContentStore, DigestGuard};
use cask_types::{OwnerId, ReferenceId};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{SdkError, SdkResult};

/// Outcome of a successful deletion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DeleteOutcome {
    pub reference: Reference,
    /// Count left on the blob, or `None` if the decrement failed and was
    /// left for the sweep to repair.
    pub remaining_references: Option<u64>,
    /// Whether the blob's metadata and bytes were removed.
    pub reclaimed: bool,
}

/// Ownership-checked deletion of a reference, reclaiming the blob when its
/// last reference goes.
///
/// Once the reference itself is gone the deletion has succeeded. A failed
/// decrement or reclaim afterwards is logged and repaired by the sweep
/// rather than reported, since the caller's view (the reference no longer
/// exists) is already correct.
///
/// A count that drops to zero is confirmed against the registry before the
/// blob is reclaimed. If other references remain, the count had drifted:
/// it is rewritten from the registry and the blob is kept.
pub struct DeletionOrchestrator {
    store: Arc<ContentStore>,
    registry: Arc<dyn ReferenceRegistry>,
}

impl DeletionOrchestrator {
    pub fn new(store: Arc<ContentStore>, registry: Arc<dyn ReferenceRegistry>) -> Self {
        Self { store, registry }
    }

    #[tracing::instrument(skip(self, owner), fields(owner = %owner))]
    pub fn delete(&self, id: &ReferenceId, owner: &OwnerId) -> SdkResult<DeleteOutcome> {
        let found = self.registry.get(id)?.ok_or(SdkError::NotFound(*id))?;
        if found.owner != *owner {
            return Err(SdkError::Forbidden(*id));
        }

        let guard = self.store.lock(&found.digest);
        // Re-checked under the lock by the registry itself.
        let reference = self.registry.delete(id, owner)?;

        let remaining_references = match self.store.decrement_ref(&guard) {
            Ok(0) => self.confirm_unreferenced(&guard, &reference),
            Ok(count) => Some(count),
            Err(e) => {
                warn!(
                    reference = %reference.id,
                    digest = %reference.digest.short_hex(),
                    error = %e,
                    "reference deleted but count not decremented"
                );
                None
            }
        };

        let mut reclaimed = false;
        if remaining_references == Some(0) {
            match self.store.reclaim_if_orphaned(&guard) {
                Ok(blob) => reclaimed = blob.is_some(),
                Err(e) => warn!(
                    digest = %reference.digest.short_hex(),
                    error = %e,
                    "failed to reclaim orphaned blob"
                ),
            }
        }

        debug!(
            reference = %reference.id,
            remaining = ?remaining_references,
            reclaimed,
            "reference deleted"
        );
        Ok(DeleteOutcome {
            reference,
            remaining_references,
            reclaimed,
        })
    }

    /// Registry count for a blob whose catalog count just reached zero,
    /// rewriting the catalog when the two disagree. `None` when the registry
    /// cannot be read, which leaves the blob for the sweep.
    fn confirm_unreferenced(&self, guard: &DigestGuard<'_>, reference: &Reference) -> Option<u64> {
        let digest = reference.digest.short_hex();
        let actual = match self.registry.count_for_digest(&reference.digest) {
            Ok(actual) => actual,
            Err(e) => {
                warn!(%digest, error = %e, "could not confirm blob is unreferenced");
                return None;
            }
        };
        if actual > 0 {
            warn!(%digest, actual, "reference count drifted below the registry; repairing");
            if let Err(e) = self.store.set_reference_count(guard, actual) {
                warn!(%digest, error = %e, "failed to repair reference count");
            }
        }
        Some(actual)
    }
}
