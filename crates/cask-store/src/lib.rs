//! Content store for cask.
//!
//! Each distinct byte sequence is kept exactly once, keyed by its
//! [`Digest`](cask_types::Digest). The store owns two things:
//!
//! - the blob catalog: digest → metadata and reference count
//!   ([`BlobCatalog`], with [`InMemoryBlobCatalog`] and the durable
//!   [`FileBlobCatalog`])
//! - the blob files: physical bytes at a path derived from the digest
//!   ([`BlobFiles`])
//!
//! [`ContentStore`] composes them. Every mutating operation takes a
//! [`DigestGuard`], so the find → decide → write → insert → count sequence
//! for one digest is serialized against any other operation on that digest.
//!
//! # Invariants
//!
//! 1. Catalog metadata for a digest exists only while its bytes are on
//!    disk. Bytes are written before metadata is inserted and metadata is
//!    removed before bytes are deleted, so a crash can leave an orphaned
//!    file but never metadata pointing at missing bytes.
//! 2. Reference counts change only through atomic catalog operations.
//! 3. Blob paths are a pure function of the digest, so concurrent writers of
//!    the same content converge on one file.

pub mod blob;
pub mod error;
pub mod file;
pub mod files;
pub mod lock;
pub mod memory;
pub mod snapshot;
pub mod store;
pub mod traits;

pub use blob::{Blob, NewBlob};
pub use error::{StoreError, StoreResult};
pub use file::FileBlobCatalog;
pub use files::{BlobFiles, WriteOutcome};
pub use lock::{DigestGuard, DigestLocks};
pub use memory::InMemoryBlobCatalog;
pub use snapshot::SnapshotFile;
pub use store::ContentStore;
pub use traits::{BlobCatalog, Insertion};
