use std::collections::BTreeMap;

use cask_refs::ReferenceRegistry;
use cask_store::ContentStore;
use cask_types::OwnerId;
use serde::Serialize;

use crate::error::SdkResult;
use crate::view::{owner_views, ReferenceView};

/// Per-owner storage usage and deduplication savings.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct StorageStats {
    pub total_references: u64,
    /// References that introduced new content when they were created.
    pub distinct_count: u64,
    /// `total_references - distinct_count`.
    pub duplicate_count: u64,
    /// Size of every referenced blob, summed per reference.
    pub total_size: u64,
    /// Size of the content this owner actually caused to be written.
    pub actual_size: u64,
    /// `total_size - actual_size`.
    pub saved_bytes: u64,
    /// `saved_bytes / total_size * 100`, or 0 for an empty account.
    pub savings_percentage: f64,
    /// Referenced bytes per blob media type.
    pub size_by_media_type: BTreeMap<String, u64>,
}

impl StorageStats {
    /// Fold reference views into totals. References to missing blobs must
    /// already have been dropped.
    pub fn from_views(views: &[ReferenceView]) -> Self {
        let mut stats = Self::default();
        for view in views {
            let size = view.blob.size_bytes;
            stats.total_references += 1;
            stats.total_size += size;
            if !view.reference.is_duplicate {
                stats.distinct_count += 1;
                stats.actual_size += size;
            }
            *stats
                .size_by_media_type
                .entry(view.blob.media_type.as_str().to_string())
                .or_default() += size;
        }
        stats.duplicate_count = stats.total_references - stats.distinct_count;
        stats.saved_bytes = stats.total_size - stats.actual_size;
        if stats.total_size > 0 {
            stats.savings_percentage = stats.saved_bytes as f64 / stats.total_size as f64 * 100.0;
        }
        stats
    }
}

/// Read-only projection over the store and the registry.
pub struct StatsAggregator<'a> {
    store: &'a ContentStore,
    registry: &'a dyn ReferenceRegistry,
}

impl<'a> StatsAggregator<'a> {
    pub fn new(store: &'a ContentStore, registry: &'a dyn ReferenceRegistry) -> Self {
        Self { store, registry }
    }

    pub fn stats_for(&self, owner: &OwnerId) -> SdkResult<StorageStats> {
        let views = owner_views(self.store, self.registry, owner)?;
        Ok(StorageStats::from_views(&views))
    }
}
