use std::io::{self, Read, Write};

use cask_types::Digest;

/// Domain-separated BLAKE3 content hasher.
///
/// The domain tag is prepended to every hash computation so a digest from
/// one namespace can never be confused with another. All digests are
/// computed incrementally: memory use does not grow with input length.
#[derive(Clone, Copy, Debug)]
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for stored blob content.
    pub const BLOB: Self = Self {
        domain: "cask-blob-v1",
    };

    /// Begin an incremental digest.
    pub fn start(&self) -> StreamingDigest {
        let mut inner = blake3::Hasher::new();
        inner.update(self.domain.as_bytes());
        inner.update(b":");
        StreamingDigest { inner, len: 0 }
    }

    /// Hash an in-memory byte slice.
    pub fn hash(&self, data: &[u8]) -> Digest {
        let mut digest = self.start();
        digest.update(data);
        digest.finish()
    }

    /// Hash everything a reader yields, returning the digest and byte count.
    ///
    /// The reader is consumed to EOF. Callers that need the bytes again must
    /// rewind it themselves.
    pub fn hash_reader<R: Read + ?Sized>(&self, reader: &mut R) -> io::Result<(Digest, u64)> {
        let mut digest = self.start();
        io::copy(reader, &mut digest)?;
        Ok((digest.finish(), digest.len()))
    }
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::BLOB
    }
}

/// An in-progress digest. Implements [`Write`] so it can sit at the end of
/// an `io::copy` or alongside another writer.
#[derive(Clone, Debug)]
pub struct StreamingDigest {
    inner: blake3::Hasher,
    len: u64,
}

impl StreamingDigest {
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
        self.len += data.len() as u64;
    }

    /// Number of content bytes fed so far (the domain tag is not counted).
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn finish(&self) -> Digest {
        Digest::from_hash(*self.inner.finalize().as_bytes())
    }
}

impl Write for StreamingDigest {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
