use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use cask_hash::{ContentHasher, StreamingDigest};
use cask_types::Digest;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{StoreError, StoreResult};

/// Result of writing a blob's bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The bytes were written and renamed into place.
    Written,
    /// A file for the digest was already in place; the new copy was discarded.
    AlreadyPresent,
}

/// Physical blob bytes laid out by digest.
///
/// ```text
/// <root>/blobs/ab/cd/abcd…   one file per digest
/// <root>/tmp/incoming-*       in-flight writes
/// ```
///
/// Writes go to `tmp/` first, are verified against the expected digest,
/// synced, and then renamed into place without overwriting. A blob file is
/// therefore either absent or complete.
#[derive(Clone, Debug)]
pub struct BlobFiles {
    blobs_dir: PathBuf,
    tmp_dir: PathBuf,
    hasher: ContentHasher,
}

impl BlobFiles {
    /// Open the layout under `root`, creating directories as needed.
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref();
        let blobs_dir = root.join("blobs");
        let tmp_dir = root.join("tmp");
        fs::create_dir_all(&blobs_dir)?;
        fs::create_dir_all(&tmp_dir)?;
        Ok(Self {
            blobs_dir,
            tmp_dir,
            hasher: ContentHasher::BLOB,
        })
    }

    pub fn blobs_dir(&self) -> &Path {
        &self.blobs_dir
    }

    pub fn tmp_dir(&self) -> &Path {
        &self.tmp_dir
    }

    /// Location of a digest relative to the blob directory.
    pub fn location(digest: &Digest) -> PathBuf {
        let hex = digest.to_hex();
        PathBuf::from(&hex[0..2]).join(&hex[2..4]).join(hex)
    }

    pub fn path(&self, digest: &Digest) -> PathBuf {
        self.blobs_dir.join(Self::location(digest))
    }

    pub fn contains(&self, digest: &Digest) -> bool {
        self.path(digest).is_file()
    }

    /// Stream `source` into the file for `digest`.
    ///
    /// The bytes are hashed as they are written; if they do not hash to
    /// `digest` nothing is placed and `HashMismatch` is returned. Any failure
    /// removes the temporary file.
    pub fn write<R: Read + ?Sized>(
        &self,
        digest: &Digest,
        source: &mut R,
    ) -> StoreResult<WriteOutcome> {
        let mut tmp = tempfile::Builder::new()
            .prefix("incoming-")
            .tempfile_in(&self.tmp_dir)?;

        let mut streaming = self.hasher.start();
        {
            let mut tee = Tee {
                file: tmp.as_file_mut(),
                digest: &mut streaming,
            };
            io::copy(source, &mut tee)?;
            tee.flush()?;
        }
        let computed = streaming.finish();
        if computed != *digest {
            return Err(StoreError::HashMismatch {
                digest: *digest,
                computed,
            });
        }
        tmp.as_file().sync_all()?;

        let target = self.path(digest);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        match tmp.persist_noclobber(&target) {
            Ok(_) => {
                debug!(digest = %digest.short_hex(), bytes = streaming.len(), "blob written");
                Ok(WriteOutcome::Written)
            }
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                debug!(digest = %digest.short_hex(), "blob already on disk");
                Ok(WriteOutcome::AlreadyPresent)
            }
            Err(e) => Err(StoreError::Io(e.error)),
        }
    }

    /// Delete the file for `digest`. Returns `false` if it was already gone.
    pub fn remove(&self, digest: &Digest) -> StoreResult<bool> {
        match fs::remove_file(self.path(digest)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub fn open_read(&self, digest: &Digest) -> StoreResult<File> {
        match File::open(self.path(digest)) {
            Ok(file) => Ok(file),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StoreError::NotFound(*digest)),
            Err(e) => Err(e.into()),
        }
    }

    /// Every digest with a file in the blob directory.
    ///
    /// Entries whose names are not digests are skipped with a warning.
    pub fn list(&self) -> StoreResult<Vec<Digest>> {
        let mut digests = Vec::new();
        for entry in WalkDir::new(&self.blobs_dir).min_depth(3).max_depth(3) {
            let entry = entry.map_err(|e| StoreError::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            match Digest::from_hex(&name) {
                Ok(digest) => digests.push(digest),
                Err(_) => warn!(path = ?entry.path(), "unexpected file in blob directory"),
            }
        }
        digests.sort();
        Ok(digests)
    }

    /// Remove temporary files not modified within `grace`.
    pub fn remove_stale_temp(&self, grace: Duration) -> StoreResult<usize> {
        let now = SystemTime::now();
        let mut removed = 0;
        for entry in fs::read_dir(&self.tmp_dir)? {
            let entry = entry?;
            let meta = entry.metadata()?;
            if !meta.is_file() {
                continue;
            }
            let age = meta
                .modified()
                .ok()
                .and_then(|m| now.duration_since(m).ok())
                .unwrap_or(Duration::ZERO);
            if age < grace {
                continue;
            }
            match fs::remove_file(entry.path()) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        if removed > 0 {
            debug!(removed, "removed stale temp files");
        }
        Ok(removed)
    }
}

/// Writer that forwards to a file and feeds the same bytes to a digest.
struct Tee<'a> {
    file: &'a mut File,
    digest: &'a mut StreamingDigest,
}

impl Write for Tee<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.file.write(buf)?;
        self.digest.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}
