//! High-level SDK for cask.
//!
//! [`Cask`] ties the content store and the reference registry together
//! behind the four owner operations (upload, list, delete, stats) plus the
//! maintenance sweep. The orchestrators it is built from are public for
//! callers that assemble their own backends.

pub mod config;
pub mod delete;
pub mod error;
pub mod principal;
pub mod repository;
pub mod stats;
pub mod sweep;
pub mod upload;
pub mod view;

#[cfg(test)]
mod fixtures;

pub use config::{CaskConfig, DEFAULT_MAX_UPLOAD_BYTES};
pub use delete::{DeleteOutcome, DeletionOrchestrator};
pub use error::{ErrorKind, SdkError, SdkResult};
pub use principal::{Credentials, PrincipalResolver, StaticTokens};
pub use repository::Cask;
pub use stats::{StatsAggregator, StorageStats};
pub use sweep::{SweepReport, Sweeper};
pub use upload::{UploadOrchestrator, UploadRequest, UploadResult};
pub use view::{BlobSummary, ReferenceView};

// Re-export key types
pub use cask_refs::Reference;
pub use cask_store::Blob;
pub use cask_types::{Digest, MediaType, OwnerId, ReferenceId};
