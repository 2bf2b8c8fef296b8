use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use cask_hash::{Inspector, MediaTypeRules, DEFAULT_SNIFF_WINDOW};
use serde::{Deserialize, Serialize};

use crate::error::{SdkError, SdkResult};

/// Default upload limit: 10 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Store configuration, usually read from a TOML file.
///
/// Every field has a default, so an empty file is a valid configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaskConfig {
    /// Directory holding blobs, temp files and metadata snapshots.
    pub root: PathBuf,
    /// Largest accepted upload. `None` disables the check.
    pub max_upload_bytes: Option<u64>,
    /// Leading bytes examined when sniffing a media type.
    pub sniff_window: usize,
    pub lock_stripes: usize,
    /// Temp files older than this are removed by the maintenance sweep.
    pub temp_grace_secs: u64,
    /// Declared/sniffed media type pairs treated as equivalent.
    pub media_type_synonyms: Vec<(String, String)>,
    /// Bearer token to owner id, for the static principal resolver.
    pub principals: BTreeMap<String, String>,
}

impl Default for CaskConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("cask-data"),
            max_upload_bytes: Some(DEFAULT_MAX_UPLOAD_BYTES),
            sniff_window: DEFAULT_SNIFF_WINDOW,
            lock_stripes: cask_store::lock::DEFAULT_STRIPES,
            temp_grace_secs: 3600,
            media_type_synonyms: cask_hash::rules::DEFAULT_SYNONYMS
                .iter()
                .map(|(a, b)| (a.to_string(), b.to_string()))
                .collect(),
            principals: BTreeMap::new(),
        }
    }
}

impl CaskConfig {
    /// Default configuration rooted at `root`.
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn load(path: &Path) -> SdkResult<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| SdkError::Config(format!("reading {}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> SdkResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| SdkError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> SdkResult<String> {
        toml::to_string_pretty(self).map_err(|e| SdkError::Config(e.to_string()))
    }

    pub fn validate(&self) -> SdkResult<()> {
        if self.sniff_window == 0 {
            return Err(SdkError::Config("sniff_window must be positive".into()));
        }
        if self.lock_stripes == 0 {
            return Err(SdkError::Config("lock_stripes must be positive".into()));
        }
        self.rules()?;
        Ok(())
    }

    pub fn rules(&self) -> SdkResult<MediaTypeRules> {
        MediaTypeRules::from_pairs(
            self.media_type_synonyms
                .iter()
                .map(|(a, b)| (a.as_str(), b.as_str())),
        )
        .map_err(|e| SdkError::Config(format!("media_type_synonyms: {e}")))
    }

    pub fn inspector(&self) -> SdkResult<Inspector> {
        Ok(Inspector::new(self.rules()?)
            .with_sniff_window(self.sniff_window)
            .with_max_size(self.max_upload_bytes))
    }

    pub fn temp_grace(&self) -> Duration {
        Duration::from_secs(self.temp_grace_secs)
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.root.join("catalog.snapshot")
    }

    pub fn references_path(&self) -> PathBuf {
        self.root.join("references.snapshot")
    }
}
