use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::{StoreError, StoreResult};

const MAGIC: &[u8; 4] = b"CSK1";

/// Header size: 4 bytes magic + 4 bytes CRC + 8 bytes payload length.
const HEADER_SIZE: usize = 16;

/// Whole-table snapshot file, replaced atomically on every save.
///
/// On-disk format:
/// ```text
/// [4 bytes: magic "CSK1"]
/// [4 bytes: CRC32 of payload (little-endian u32)]
/// [8 bytes: payload length (little-endian u64)]
/// [N bytes: payload (bincode-serialized table)]
/// ```
///
/// A save writes a temporary file in the same directory, syncs it and
/// renames it over the previous snapshot, so readers see either the old
/// table or the new one.
#[derive(Clone, Debug)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the table. Returns `Ok(None)` if no snapshot has been written yet.
    pub fn load<T: DeserializeOwned>(&self) -> StoreResult<Option<T>> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;

        if bytes.len() < HEADER_SIZE {
            return Err(self.corrupt("truncated header"));
        }
        if &bytes[0..4] != MAGIC {
            return Err(self.corrupt("bad magic"));
        }
        let expected_crc = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        let mut len_buf = [0u8; 8];
        len_buf.copy_from_slice(&bytes[8..HEADER_SIZE]);
        let length = u64::from_le_bytes(len_buf);

        let payload = &bytes[HEADER_SIZE..];
        if payload.len() as u64 != length {
            return Err(self.corrupt(format!(
                "payload length {} does not match header {length}",
                payload.len()
            )));
        }
        let actual_crc = crc32fast::hash(payload);
        if actual_crc != expected_crc {
            return Err(self.corrupt(format!(
                "CRC mismatch: expected {expected_crc:08x}, got {actual_crc:08x}"
            )));
        }

        let table = bincode::deserialize(payload)
            .map_err(|e| self.corrupt(format!("undecodable payload: {e}")))?;
        debug!(path = ?self.path, len = length, "snapshot loaded");
        Ok(Some(table))
    }

    /// Serialize `table` and atomically replace the snapshot with it.
    pub fn save<T: Serialize>(&self, table: &T) -> StoreResult<()> {
        let payload =
            bincode::serialize(table).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let crc = crc32fast::hash(&payload);

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut tmp = tempfile::Builder::new()
            .prefix(".snapshot-")
            .tempfile_in(dir)?;
        {
            let file = tmp.as_file_mut();
            file.write_all(MAGIC)?;
            file.write_all(&crc.to_le_bytes())?;
            file.write_all(&(payload.len() as u64).to_le_bytes())?;
            file.write_all(&payload)?;
            file.sync_all()?;
        }
        tmp.persist(&self.path).map_err(|e| StoreError::Io(e.error))?;

        debug!(path = ?self.path, len = payload.len(), "snapshot saved");
        Ok(())
    }

    fn corrupt(&self, reason: impl Into<String>) -> StoreError {
        StoreError::CorruptSnapshot {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn sample() -> BTreeMap<String, u64> {
        let mut map = BTreeMap::new();
        map.insert("alpha".to_string(), 1);
        map.insert("beta".to_string(), 2);
        map
    }

    #[test]
    fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let snap = SnapshotFile::new(dir.path().join("absent.snapshot"));
        let loaded: Option<BTreeMap<String, u64>> = snap.load().unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let snap = SnapshotFile::new(dir.path().join("table.snapshot"));
        snap.save(&sample()).unwrap();

        let loaded: BTreeMap<String, u64> = snap.load().unwrap().unwrap();
        assert_eq!(loaded, sample());
    }

    #[test]
    fn save_replaces_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let snap = SnapshotFile::new(dir.path().join("table.snapshot"));
        snap.save(&sample()).unwrap();
        snap.save(&BTreeMap::<String, u64>::new()).unwrap();

        let loaded: BTreeMap<String, u64> = snap.load().unwrap().unwrap();
        assert!(loaded.is_empty());

        // No temp files are left behind next to the snapshot.
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn flipped_byte_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.snapshot");
        let snap = SnapshotFile::new(&path);
        snap.save(&sample()).unwrap();

        let mut bytes = fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        fs::write(&path, &bytes).unwrap();

        let err = snap.load::<BTreeMap<String, u64>>().unwrap_err();
        assert!(matches!(err, StoreError::CorruptSnapshot { .. }));
    }

    #[test]
    fn truncated_file_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.snapshot");
        let snap = SnapshotFile::new(&path);
        snap.save(&sample()).unwrap();

        let bytes = fs::read(&path).unwrap();
        fs::write(&path, &bytes[..bytes.len() - 3]).unwrap();
        assert!(matches!(
            snap.load::<BTreeMap<String, u64>>(),
            Err(StoreError::CorruptSnapshot { .. })
        ));

        fs::write(&path, b"CSK").unwrap();
        assert!(matches!(
            snap.load::<BTreeMap<String, u64>>(),
            Err(StoreError::CorruptSnapshot { .. })
        ));
    }

    #[test]
    fn wrong_magic_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.snapshot");
        fs::write(&path, [0u8; 32]).unwrap();
        let err = SnapshotFile::new(&path)
            .load::<BTreeMap<String, u64>>()
            .unwrap_err();
        assert!(matches!(err, StoreError::CorruptSnapshot { .. }));
    }
}
