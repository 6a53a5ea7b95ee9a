//! Configuration System
//!
//! Three layers, later wins:
//! - Defaults (`ArchiveConfig::default()`)
//! - YAML v1 file (`ArchiveConfig::from_yaml`)
//! - Environment (`ARCHIVE_MANIFEST_PATH`, `ARCHIVE_INDEX_DIR`,
//!   `ARCHIVE_INDEX_SUMMARIES`)
//!
//! # Examples
//!
//! ```rust,ignore
//! use archive_index::config::ArchiveConfig;
//!
//! let config = ArchiveConfig::from_yaml("archive.yaml")?.with_env_overrides()?;
//! config.validate()?;
//! let index = LexicalIndex::open(&config.index.dir, config.index_options())?;
//! ```
//!
//! # YAML v1
//!
//! ```yaml
//! version: 1
//! manifest:
//!   path: ./archive.db
//! index:
//!   dir: ./index
//!   index_summaries: true
//!   batch_size: 100
//!   writer_heap_bytes: 50000000
//! search:
//!   default_limit: 10
//! ```

pub mod error;
pub mod io;

// Re-exports
pub use error::{ConfigError, ConfigResult};
pub use io::ConfigExportV1;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::features::lexical::{
    IndexOptions, RebuildOptions, DEFAULT_BATCH_SIZE, DEFAULT_LIMIT, DEFAULT_WRITER_HEAP_BYTES,
};

pub const ENV_MANIFEST_PATH: &str = "ARCHIVE_MANIFEST_PATH";
pub const ENV_INDEX_DIR: &str = "ARCHIVE_INDEX_DIR";
pub const ENV_INDEX_SUMMARIES: &str = "ARCHIVE_INDEX_SUMMARIES";

/// Tantivy rejects writer heaps below this.
pub const MIN_WRITER_HEAP_BYTES: usize = 15_000_000;

/// Manifest Store location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ManifestConfig {
    /// SQLite file (parent dirs created on open)
    pub path: PathBuf,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./archive.db"),
        }
    }
}

/// Index Engine settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndexConfig {
    pub dir: PathBuf,

    /// Carry record summaries into the index
    pub index_summaries: bool,

    /// Documents per rebuild commit (1..=10000)
    pub batch_size: usize,

    /// Writer memory budget (>= 15MB)
    pub writer_heap_bytes: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./index"),
            index_summaries: true,
            batch_size: DEFAULT_BATCH_SIZE,
            writer_heap_bytes: DEFAULT_WRITER_HEAP_BYTES,
        }
    }
}

impl IndexConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.batch_size < 1 || self.batch_size > 10000 {
            return Err(ConfigError::range_with_hint(
                "index.batch_size",
                self.batch_size,
                1,
                10000,
                "Rebuild commits every batch_size documents",
            ));
        }

        if self.writer_heap_bytes < MIN_WRITER_HEAP_BYTES {
            return Err(ConfigError::range_with_hint(
                "index.writer_heap_bytes",
                self.writer_heap_bytes,
                MIN_WRITER_HEAP_BYTES,
                usize::MAX,
                "Tantivy needs at least 15MB of writer heap",
            ));
        }

        Ok(())
    }
}

/// Query Engine settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchConfig {
    /// Page size when the caller gives none (1..=1000)
    pub default_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT,
        }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.default_limit < 1 || self.default_limit > 1000 {
            return Err(ConfigError::range_with_hint(
                "search.default_limit",
                self.default_limit,
                1,
                1000,
                "Page size must be reasonable",
            ));
        }
        Ok(())
    }
}

/// Complete configuration for a manifest/index pair
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveConfig {
    pub manifest: ManifestConfig,
    pub index: IndexConfig,
    pub search: SearchConfig,
}

impl ArchiveConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        self.index.validate()?;
        self.search.validate()?;
        Ok(())
    }

    /// Apply `ARCHIVE_*` environment variables.
    pub fn with_env_overrides(self) -> ConfigResult<Self> {
        self.with_overrides_from(|var| std::env::var(var).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn with_overrides_from(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> ConfigResult<Self> {
        if let Some(path) = lookup(ENV_MANIFEST_PATH).filter(|v| !v.is_empty()) {
            self.manifest.path = PathBuf::from(path);
        }
        if let Some(dir) = lookup(ENV_INDEX_DIR).filter(|v| !v.is_empty()) {
            self.index.dir = PathBuf::from(dir);
        }
        if let Some(value) = lookup(ENV_INDEX_SUMMARIES).filter(|v| !v.is_empty()) {
            self.index.index_summaries = parse_bool(&value).ok_or_else(|| ConfigError::InvalidEnv {
                var: ENV_INDEX_SUMMARIES.to_string(),
                value: value.clone(),
                hint: "Use true/false, 1/0 or yes/no".to_string(),
            })?;
        }
        Ok(self)
    }

    pub fn index_options(&self) -> IndexOptions {
        IndexOptions {
            index_summaries: self.index.index_summaries,
            writer_heap_bytes: self.index.writer_heap_bytes,
        }
    }

    pub fn rebuild_options(&self) -> RebuildOptions {
        RebuildOptions::default().with_batch_size(self.index.batch_size)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
