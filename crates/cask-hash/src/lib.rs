//! Content identity and media-type validation for cask.
//!
//! Everything in this crate is a pure function over bytes: nothing here
//! writes to disk or touches the catalogs.
//!
//! - [`ContentHasher`]: domain-separated, streaming BLAKE3 digests
//! - [`sniff`]: media type detection from the leading bytes of a file
//! - [`MediaTypeRules`]: declared-vs-sniffed equivalence with synonyms
//! - [`Inspector`]: the combined check run once per upload

pub mod error;
pub mod hasher;
pub mod inspect;
pub mod rules;
pub mod sniff;

pub use error::{HashError, HashResult};
pub use hasher::{ContentHasher, StreamingDigest};
pub use inspect::{Fingerprint, Inspector, DEFAULT_SNIFF_WINDOW};
pub use rules::MediaTypeRules;
pub use sniff::sniff;
