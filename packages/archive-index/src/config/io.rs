//! Configuration I/O (YAML loading and export)

use super::{ArchiveConfig, ConfigError, ConfigResult, IndexConfig, ManifestConfig, SearchConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

pub const SUPPORTED_VERSIONS: [u32; 1] = [1];

/// YAML Schema v1
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigExportV1 {
    /// Schema version (always 1 for v1)
    pub version: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest: Option<ManifestConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<IndexConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<SearchConfig>,
}

impl ArchiveConfig {
    /// Load and validate a YAML v1 file. Missing sections keep defaults.
    pub fn from_yaml(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_yaml_str(&content)?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        let export: ConfigExportV1 = serde_yaml::from_str(content)?;

        // Version check
        let version = export.version.ok_or(ConfigError::MissingVersion)?;
        if !SUPPORTED_VERSIONS.contains(&version) {
            return Err(ConfigError::UnsupportedVersion {
                found: version,
                supported: SUPPORTED_VERSIONS.to_vec(),
            });
        }

        let config = Self {
            manifest: export.manifest.unwrap_or_default(),
            index: export.index.unwrap_or_default(),
            search: export.search.unwrap_or_default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> ConfigResult<String> {
        let export = ConfigExportV1 {
            version: Some(1),
            manifest: Some(self.manifest.clone()),
            index: Some(self.index.clone()),
            search: Some(self.search.clone()),
        };

        serde_yaml::to_string(&export).map_err(ConfigError::Yaml)
    }
}
