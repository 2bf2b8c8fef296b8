use cask_refs::{Reference, ReferenceRegistry};
use cask_store::{Blob, ContentStore};
use cask_types::{Digest, MediaType, OwnerId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::error::SdkResult;

/// The blob fields shown alongside a reference.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BlobSummary {
    pub digest: Digest,
    pub original_name: String,
    pub media_type: MediaType,
    pub size_bytes: u64,
    pub reference_count: u64,
    pub created_at: DateTime<Utc>,
}

impl From<&Blob> for BlobSummary {
    fn from(blob: &Blob) -> Self {
        Self {
            digest: blob.digest,
            original_name: blob.original_name.clone(),
            media_type: blob.media_type.clone(),
            size_bytes: blob.size_bytes,
            reference_count: blob.reference_count,
            created_at: blob.created_at,
        }
    }
}

/// A reference with its blob summary denormalized in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReferenceView {
    pub reference: Reference,
    pub blob: BlobSummary,
}

/// The owner's references newest-first, each joined with its blob.
///
/// References whose blob is missing are skipped with a warning.
///
/// The registry and the catalog are read one after the other rather than
/// under one lock. The reference list is a single registry snapshot and
/// every blob comes from one catalog read. A reference deleted in between
/// shows up as a missing blob and is dropped, and the counts of shared
/// blobs may already include later activity by other owners. Blob sizes
/// and media types never change once stored, so stats built from a view
/// depend only on the owner's own reference list.
pub(crate) fn owner_views(
    store: &ContentStore,
    registry: &dyn ReferenceRegistry,
    owner: &OwnerId,
) -> SdkResult<Vec<ReferenceView>> {
    let references = registry.list_by_owner(owner)?;
    let digests: Vec<Digest> = references.iter().map(|r| r.digest).collect();
    let blobs = store.catalog().get_many(&digests)?;

    let views = references
        .into_iter()
        .zip(blobs)
        .filter_map(|(reference, blob)| match blob {
            Some(blob) => Some(ReferenceView {
                blob: BlobSummary::from(&blob),
                reference,
            }),
            None => {
                warn!(
                    reference = %reference.id,
                    digest = %reference.digest.short_hex(),
                    "reference points at a missing blob"
                );
                None
            }
        })
        .collect();
    Ok(views)
}
