use std::path::{Path, PathBuf};

use kvlog_history::DEFAULT_BATCH_SIZE;
use kvlog_log::SyncMode;
use serde::{Deserialize, Serialize};

use crate::error::{KvError, KvResult};

/// Trimmed values longer than this many bytes go to the value store.
pub const DEFAULT_INLINE_THRESHOLD: usize = 200;

/// Configuration for a [`KvLog`](crate::KvLog).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KvConfig {
    /// Values whose trimmed length in bytes exceeds this are stored by
    /// content hash instead of inline in the history entry.
    pub inline_threshold: usize,
    /// Entries a history cursor fetches per round trip.
    pub cursor_batch_size: usize,
    /// Where the value store and history index live.
    pub storage: StorageConfig,
}

/// Backend selection.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StorageConfig {
    /// Everything in process memory; lost on exit.
    #[default]
    Memory,
    /// Record logs under `dir`.
    File {
        dir: PathBuf,
        #[serde(default)]
        sync_mode: SyncMode,
    },
}

impl Default for KvConfig {
    fn default() -> Self {
        Self {
            inline_threshold: DEFAULT_INLINE_THRESHOLD,
            cursor_batch_size: DEFAULT_BATCH_SIZE,
            storage: StorageConfig::Memory,
        }
    }
}

impl KvConfig {
    /// A file-backed configuration rooted at `dir`.
    pub fn file(dir: impl Into<PathBuf>) -> Self {
        Self {
            storage: StorageConfig::File {
                dir: dir.into(),
                sync_mode: SyncMode::default(),
            },
            ..Default::default()
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> KvResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| KvError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse, and validate a TOML file.
    pub fn load(path: &Path) -> KvResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Serialize to TOML.
    pub fn to_toml_string(&self) -> KvResult<String> {
        toml::to_string_pretty(self).map_err(|e| KvError::Config(e.to_string()))
    }

    pub fn validate(&self) -> KvResult<()> {
        if self.cursor_batch_size == 0 {
            return Err(KvError::Config("cursor_batch_size must be at least 1".into()));
        }
        if let StorageConfig::File { dir, .. } = &self.storage {
            if dir.as_os_str().is_empty() {
                return Err(KvError::Config("storage dir must not be empty".into()));
            }
        }
        Ok(())
    }
}
