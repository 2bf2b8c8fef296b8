use std::io::{Read, Seek};

use cask_types::{Digest, MediaType};

use crate::error::{HashError, HashResult};
use crate::hasher::ContentHasher;
use crate::rules::MediaTypeRules;
use crate::sniff::sniff;

/// Number of leading bytes handed to the sniffer.
pub const DEFAULT_SNIFF_WINDOW: usize = 512;

/// Identity and detected type of a piece of content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fingerprint {
    pub digest: Digest,
    pub size: u64,
    pub sniffed_media_type: MediaType,
}

/// Hasher/validator run once per upload, before any storage mutation.
///
/// The source must be seekable: it is read once for sniffing and once for
/// hashing, and left rewound to the start so the caller can store the same
/// bytes afterwards.
#[derive(Clone, Debug)]
pub struct Inspector {
    hasher: ContentHasher,
    rules: MediaTypeRules,
    sniff_window: usize,
    max_size: Option<u64>,
}

impl Inspector {
    pub fn new(rules: MediaTypeRules) -> Self {
        Self {
            hasher: ContentHasher::BLOB,
            rules,
            sniff_window: DEFAULT_SNIFF_WINDOW,
            max_size: None,
        }
    }

    pub fn with_sniff_window(mut self, window: usize) -> Self {
        self.sniff_window = window;
        self
    }

    pub fn with_max_size(mut self, max_size: Option<u64>) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn hasher(&self) -> &ContentHasher {
        &self.hasher
    }

    pub fn rules(&self) -> &MediaTypeRules {
        &self.rules
    }

    /// Sniff, validate against `declared` (if any), then hash.
    ///
    /// With no declared type the sniffed type is accepted as-is. The type
    /// check runs first so mismatched content is never hashed.
    pub fn inspect<R: Read + Seek>(
        &self,
        source: &mut R,
        declared: Option<&MediaType>,
    ) -> HashResult<Fingerprint> {
        source.rewind()?;
        let mut head = Vec::with_capacity(self.sniff_window);
        source
            .by_ref()
            .take(self.sniff_window as u64)
            .read_to_end(&mut head)?;
        let sniffed_media_type = sniff(&head);

        if let Some(declared) = declared {
            self.rules.check(declared, &sniffed_media_type)?;
        }

        source.rewind()?;
        let cap = self.max_size.map_or(u64::MAX, |max| max.saturating_add(1));
        let (digest, size) = self.hasher.hash_reader(&mut source.by_ref().take(cap))?;
        source.rewind()?;

        if let Some(limit) = self.max_size {
            if size > limit {
                return Err(HashError::TooLarge { limit });
            }
        }

        tracing::debug!(digest = %digest.short_hex(), size, media_type = %sniffed_media_type, "inspected content");
        Ok(Fingerprint {
            digest,
            size,
            sniffed_media_type,
        })
    }
}

impl Default for Inspector {
    fn default() -> Self {
        Self::new(MediaTypeRules::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor, SeekFrom};

    fn mt(s: &str) -> MediaType {
        MediaType::parse(s).unwrap()
    }

    #[test]
    fn fingerprint_of_text() {
        let mut src = Cursor::new(b"hello there".to_vec());
        let fp = Inspector::default()
            .inspect(&mut src, Some(&mt("text/plain")))
            .unwrap();
        assert_eq!(fp.size, 11);
        assert_eq!(fp.digest, ContentHasher::BLOB.hash(b"hello there"));
        assert_eq!(fp.sniffed_media_type.as_str(), "text/plain");
    }

    #[test]
    fn source_is_rewound_afterwards() {
        let mut src = Cursor::new(b"rewind me".to_vec());
        src.seek(SeekFrom::End(0)).unwrap();
        Inspector::default().inspect(&mut src, None).unwrap();
        assert_eq!(src.position(), 0);
    }

    #[test]
    fn synonym_declared_type_accepted() {
        let binary = vec![0u8, 1, 2, 3, 0xff];
        let fp = Inspector::default()
            .inspect(&mut Cursor::new(binary), Some(&mt("text/plain")))
            .unwrap();
        assert_eq!(fp.sniffed_media_type.as_str(), "application/octet-stream");

        Inspector::default()
            .inspect(
                &mut Cursor::new(b"plain words".to_vec()),
                Some(&mt("application/octet-stream")),
            )
            .unwrap();
    }

    #[test]
    fn mismatch_rejected() {
        let pdf = b"%PDF-1.4\n1 0 obj".to_vec();
        let err = Inspector::default()
            .inspect(&mut Cursor::new(pdf), Some(&mt("image/png")))
            .unwrap_err();
        assert!(matches!(err, HashError::ContentMismatch { .. }));
    }

    #[test]
    fn size_limit_enforced() {
        let inspector = Inspector::default().with_max_size(Some(4));
        assert!(inspector
            .inspect(&mut Cursor::new(b"four".to_vec()), None)
            .is_ok());
        let err = inspector
            .inspect(&mut Cursor::new(b"fives".to_vec()), None)
            .unwrap_err();
        assert!(matches!(err, HashError::TooLarge { limit: 4 }));
    }

    #[test]
    fn aborted_stream_is_io_error() {
        struct Broken(Cursor<Vec<u8>>);
        impl Read for Broken {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                if self.0.position() >= 8 {
                    return Err(io::Error::new(io::ErrorKind::ConnectionAborted, "client went away"));
                }
                let n = buf.len().min(4);
                self.0.read(&mut buf[..n])
            }
        }
        impl Seek for Broken {
            fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
                self.0.seek(pos)
            }
        }

        let mut src = Broken(Cursor::new(vec![b'a'; 64]));
        let err = Inspector::default()
            .with_sniff_window(4)
            .inspect(&mut src, None)
            .unwrap_err();
        assert!(matches!(err, HashError::Io(_)));
    }
}
