use std::sync::{Mutex, MutexGuard, PoisonError};

use cask_types::Digest;

/// Default number of lock stripes.
pub const DEFAULT_STRIPES: usize = 64;

/// Striped per-digest mutual exclusion.
///
/// Two operations on the same digest always map to the same stripe and run
/// one after the other. Operations on different digests usually run in
/// parallel; a stripe collision only costs throughput.
#[derive(Debug)]
pub struct DigestLocks {
    stripes: Box<[Mutex<()>]>,
}

impl DigestLocks {
    /// Create a lock table with `stripes` stripes (at least one).
    pub fn new(stripes: usize) -> Self {
        let stripes = (0..stripes.max(1)).map(|_| Mutex::new(())).collect();
        Self { stripes }
    }

    pub fn stripe_count(&self) -> usize {
        self.stripes.len()
    }

    /// Block until the stripe for `digest` is free and hold it.
    ///
    /// The stripe protects no data of its own, so a poisoned stripe is
    /// recovered rather than reported.
    pub fn lock(&self, digest: &Digest) -> DigestGuard<'_> {
        let index = (digest.fold_u64() % self.stripes.len() as u64) as usize;
        let held = self.stripes[index]
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        DigestGuard {
            digest: *digest,
            _held: held,
        }
    }
}

impl Default for DigestLocks {
    fn default() -> Self {
        Self::new(DEFAULT_STRIPES)
    }
}

/// Proof that the caller holds the lock for one digest.
#[derive(Debug)]
pub struct DigestGuard<'a> {
    digest: Digest,
    _held: MutexGuard<'a, ()>,
}

impl DigestGuard<'_> {
    pub fn digest(&self) -> &Digest {
        &self.digest
    }
}
