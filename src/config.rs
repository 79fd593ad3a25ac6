//! Store configuration
//!
//! Every store is built from an explicit [`StoreConfig`]; there is no global
//! connection state. Configurations serialize to JSON so a benchmark run can
//! list its stores in a file:
//!
//! ```json
//! [
//!   {"name": "velocity", "data_dir": "tmp/velocity",
//!    "backend": {"kind": "velocity", "batch_size": 500,
//!                "coordinates": {"mode": "paired", "pairing": "elegant"}}},
//!   {"data_dir": "tmp/gzip", "backend": {"kind": "file", "compression": "gzip"}}
//! ]
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::pairing::{CodecConfig, CoordinateCodec};
use crate::error::{Error, Result};

pub const DEFAULT_PARTITION_PREFIX_LEN: usize = 13;
pub const DEFAULT_ITEM_KEY_WIDTH: usize = 16;
pub const DEFAULT_SUBITEM_KEY_WIDTH: usize = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Display name, defaults to a description of the backend
    #[serde(default)]
    pub name: Option<String>,
    pub data_dir: PathBuf,
    #[serde(default)]
    pub backend: BackendConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    Velocity(VelocityConfig),
    File(FileConfig),
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Velocity(VelocityConfig::default())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VelocityConfig {
    /// Documents queued before one dedup + write pass; 1 commits every document
    pub batch_size: usize,
    /// Timestamp prefix length selecting the segment file
    pub partition_prefix_len: usize,
    /// Hex characters kept from item digests
    pub item_key_width: usize,
    /// Hex characters kept from subitem digests
    pub subitem_key_width: usize,
    pub coordinates: CoordinateStorage,
    /// fsync each commit frame
    pub sync_writes: bool,
}

impl Default for VelocityConfig {
    fn default() -> Self {
        Self {
            batch_size: 1,
            partition_prefix_len: DEFAULT_PARTITION_PREFIX_LEN,
            item_key_width: DEFAULT_ITEM_KEY_WIDTH,
            subitem_key_width: DEFAULT_SUBITEM_KEY_WIDTH,
            coordinates: CoordinateStorage::default(),
            sync_writes: false,
        }
    }
}

impl VelocityConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be at least 1".to_string()));
        }
        if self.partition_prefix_len == 0 {
            return Err(Error::Config("partition_prefix_len must be at least 1".to_string()));
        }
        if let CoordinateStorage::Paired(codec) = &self.coordinates {
            CoordinateCodec::new(codec.clone())?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CoordinateStorage {
    /// Both coordinates kept as `f64`
    #[default]
    Raw,
    /// Coordinates packed through the pairing codec
    Paired(CodecConfig),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileCompression {
    #[default]
    None,
    Gzip,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub compression: FileCompression,
}

impl StoreConfig {
    pub fn velocity(data_dir: impl Into<PathBuf>, config: VelocityConfig) -> Self {
        Self { name: None, data_dir: data_dir.into(), backend: BackendConfig::Velocity(config) }
    }

    pub fn file(data_dir: impl Into<PathBuf>, compression: FileCompression) -> Self {
        Self {
            name: None,
            data_dir: data_dir.into(),
            backend: BackendConfig::File(FileConfig { compression }),
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(Error::Config("data_dir must not be empty".to_string()));
        }
        match &self.backend {
            BackendConfig::Velocity(velocity) => velocity.validate(),
            BackendConfig::File(_) => Ok(()),
        }
    }

    /// Load a JSON array of store configurations.
    pub fn load_all(path: &Path) -> Result<Vec<StoreConfig>> {
        let text = fs::read_to_string(path)?;
        let configs: Vec<StoreConfig> = serde_json::from_str(&text)?;
        for config in &configs {
            config.validate()?;
        }
        Ok(configs)
    }
}
