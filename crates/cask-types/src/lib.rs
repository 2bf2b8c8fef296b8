//! Foundation types for cask.
//!
//! Every other cask crate depends on `cask-types`.
//!
//! # Key Types
//!
//! - [`Digest`]: Content-addressed identity of a blob (BLAKE3 hash)
//! - [`OwnerId`]: Opaque identity of the user owning a reference
//! - [`ReferenceId`]: UUID v7 surrogate key of a reference
//! - [`MediaType`]: Normalized `type/subtype` essence

pub mod digest;
pub mod error;
pub mod identity;
pub mod media;

pub use digest::Digest;
pub use error::TypeError;
pub use identity::{OwnerId, ReferenceId};
pub use media::MediaType;
