//! Reference registry for cask.
//!
//! A reference is an owner's named pointer to a stored blob. Owners see only
//! their references; the blobs behind them are shared and deduplicated by
//! the content store.
//!
//! # Architecture
//!
//! - Each (owner, digest) pair has at most one reference. The registry
//!   enforces this itself so that racing creates resolve to one winner.
//! - Deletion is ownership-checked: an unknown id is `NotFound`, someone
//!   else's reference is `Forbidden`.
//! - The registry does not adjust blob reference counts; the orchestrators
//!   in `cask-sdk` pair each registry mutation with the matching counter
//!   change explicitly.
//!
//! # Modules
//!
//! - [`error`]: Error types for registry operations
//! - [`types`]: [`Reference`] and [`NewReference`]
//! - [`traits`]: The [`ReferenceRegistry`] trait
//! - [`names`]: Display name validation
//! - [`memory`]: [`InMemoryReferenceRegistry`] for tests and embedding
//! - [`file`]: [`FileReferenceRegistry`], persisted as a snapshot file

pub mod error;
pub mod file;
pub mod memory;
pub mod names;
pub mod traits;
pub mod types;

pub use error::{RefError, Result};
pub use file::FileReferenceRegistry;
pub use memory::InMemoryReferenceRegistry;
pub use names::{validate_display_name, MAX_DISPLAY_NAME_BYTES};
pub use traits::ReferenceRegistry;
pub use types::{NewReference, Reference};
