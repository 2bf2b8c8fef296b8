use std::path::PathBuf;

use cask_types::{Digest, MediaType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Catalog record for one distinct piece of content.
///
/// Everything but `reference_count` is fixed at first ingestion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blob {
    pub digest: Digest,
    /// File name supplied by the first uploader.
    pub original_name: String,
    /// Sniffed media type at first ingestion.
    pub media_type: MediaType,
    pub size_bytes: u64,
    /// Path of the bytes, relative to the blob directory.
    pub storage_location: PathBuf,
    /// Number of live references. Mutated only by the catalog.
    pub reference_count: u64,
    pub created_at: DateTime<Utc>,
}

impl Blob {
    /// Whether the blob has no references left and may be reclaimed.
    pub fn is_orphaned(&self) -> bool {
        self.reference_count == 0
    }
}

/// Metadata supplied when a digest is stored for the first time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewBlob {
    pub original_name: String,
    pub media_type: MediaType,
    pub size_bytes: u64,
}
