use std::io::{Read, Seek};
use std::sync::Arc;

use cask_hash::Inspector;
use cask_refs::{validate_display_name, NewReference, RefError, Reference, ReferenceRegistry};
use cask_store::{Blob, ContentStore, DigestGuard, NewBlob};
use cask_types::{MediaType, OwnerId};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{SdkError, SdkResult};

/// One file to upload, minus its bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadRequest {
    pub owner: OwnerId,
    /// Becomes the reference's display name, and the blob's original name
    /// if the content is new.
    pub filename: String,
    /// Media type claimed by the caller. `None` accepts the sniffed type.
    pub declared_media_type: Option<MediaType>,
    pub is_private: bool,
}

impl UploadRequest {
    /// A private upload with no declared media type.
    pub fn new(owner: OwnerId, filename: impl Into<String>) -> Self {
        Self {
            owner,
            filename: filename.into(),
            declared_media_type: None,
            is_private: true,
        }
    }

    pub fn declared(mut self, media_type: MediaType) -> Self {
        self.declared_media_type = Some(media_type);
        self
    }

    pub fn private(mut self, is_private: bool) -> Self {
        self.is_private = is_private;
        self
    }
}

/// Outcome of a successful upload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UploadResult {
    pub reference: Reference,
    pub blob: Blob,
    /// The content was already stored before this upload.
    pub was_duplicate: bool,
    /// Bytes not written because the content was already stored.
    pub saved_bytes: u64,
}

/// Inspect → store → reference, as one all-or-nothing operation.
///
/// Everything after inspection runs under the content digest's lock, so
/// concurrent uploads of the same content (by any owners) are serialized
/// and agree on whether the content is new.
pub struct UploadOrchestrator {
    inspector: Inspector,
    store: Arc<ContentStore>,
    registry: Arc<dyn ReferenceRegistry>,
}

impl UploadOrchestrator {
    pub fn new(
        inspector: Inspector,
        store: Arc<ContentStore>,
        registry: Arc<dyn ReferenceRegistry>,
    ) -> Self {
        Self {
            inspector,
            store,
            registry,
        }
    }

    pub fn inspector(&self) -> &Inspector {
        &self.inspector
    }

    /// Upload `source` for `request.owner`.
    ///
    /// `source` is read twice (once to inspect, once to store) and must
    /// yield the same bytes both times; if it does not, the upload fails
    /// before any metadata is written.
    #[tracing::instrument(skip(self, request, source), fields(owner = %request.owner, filename = %request.filename))]
    pub fn upload<R: Read + Seek>(
        &self,
        request: UploadRequest,
        source: &mut R,
    ) -> SdkResult<UploadResult> {
        validate_display_name(&request.filename)?;
        let fingerprint = self
            .inspector
            .inspect(source, request.declared_media_type.as_ref())?;
        let digest = fingerprint.digest;

        let guard = self.store.lock(&digest);

        if let Some(blob) = self.store.find_by_digest(&digest)? {
            if let Some(reference) = self
                .registry
                .find_by_owner_and_digest(&request.owner, &digest)?
            {
                debug!(reference = %reference.id, "owner already holds this content");
                return Ok(UploadResult {
                    saved_bytes: blob.size_bytes,
                    reference,
                    blob,
                    was_duplicate: true,
                });
            }
        }

        let (mut blob, created) = self.store.create_or_attach(
            &guard,
            source,
            NewBlob {
                original_name: request.filename.clone(),
                media_type: fingerprint.sniffed_media_type,
                size_bytes: fingerprint.size,
            },
        )?;

        let created_reference = self.registry.create(NewReference {
            owner: request.owner.clone(),
            digest,
            display_name: request.filename,
            is_private: request.is_private,
            is_duplicate: !created,
        });
        let reference = match created_reference {
            Ok(reference) => reference,
            Err(RefError::DuplicateReference { existing, .. }) => {
                return self.attach_to_existing(&guard, existing);
            }
            Err(e) => {
                if created {
                    self.discard_new_blob(&guard);
                }
                return Err(e.into());
            }
        };

        match self.store.increment_ref(&guard) {
            Ok(count) => blob.reference_count = count,
            Err(e) => {
                let undone = self.undo_reference(&reference);
                if created && undone {
                    self.discard_new_blob(&guard);
                }
                return Err(e.into());
            }
        }

        let saved_bytes = if created { 0 } else { blob.size_bytes };
        debug!(
            reference = %reference.id,
            digest = %digest.short_hex(),
            created,
            count = blob.reference_count,
            "upload committed"
        );
        Ok(UploadResult {
            reference,
            blob,
            was_duplicate: !created,
            saved_bytes,
        })
    }

    /// The registry already had a reference for (owner, digest) that the
    /// pre-check did not see. Attach to it and bring the count in line with
    /// the registry.
    fn attach_to_existing(
        &self,
        guard: &DigestGuard<'_>,
        existing: cask_types::ReferenceId,
    ) -> SdkResult<UploadResult> {
        let reference = self.registry.get(&existing)?.ok_or_else(|| {
            SdkError::Internal(format!("conflicting reference {existing} vanished"))
        })?;
        let count = self.registry.count_for_digest(guard.digest())?;
        self.store.set_reference_count(guard, count)?;
        let blob = self.store.get(guard.digest())?;
        warn!(reference = %reference.id, count, "attached to a reference the pre-check missed");
        Ok(UploadResult {
            saved_bytes: blob.size_bytes,
            reference,
            blob,
            was_duplicate: true,
        })
    }

    fn undo_reference(&self, reference: &Reference) -> bool {
        match self.registry.delete(&reference.id, &reference.owner) {
            Ok(_) => true,
            Err(e) => {
                warn!(reference = %reference.id, error = %e, "failed to roll back reference");
                false
            }
        }
    }

    fn discard_new_blob(&self, guard: &DigestGuard<'_>) {
        if let Err(e) = self.store.reclaim_if_orphaned(guard) {
            warn!(
                digest = %guard.digest().short_hex(),
                error = %e,
                "failed to roll back new blob; the sweep will remove it"
            );
        }
    }
}
