//! Configuration handling for the alnproj CLI
//!
//! Reads `alnproj.toml`; the `[write]` and `[load]` tables deserialize
//! straight into the engine option structs.

use alnproj_core::{LoadOptions, WriteOptions};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "alnproj.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub write: WriteOptions,
    #[serde(default)]
    pub load: LoadOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log filter used when `--verbose` is not given
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from file or use defaults
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_from_file(path),
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::load_from_file(&default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse configuration file: {}", path.display()))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.write.compression, "deflated");
        assert!(config.load.reuse_viewers);
        assert_eq!(config.load.unique_suffix, None);
    }

    #[test]
    fn test_config_roundtrip() -> Result<()> {
        let mut config = Config::default();
        config.write.embed_viewer_sessions = false;
        config.load.unique_suffix = Some("_1".to_string());
        let temp_file = NamedTempFile::new()?;

        std::fs::write(temp_file.path(), toml::to_string_pretty(&config)?)?;
        let loaded = Config::load_from_file(temp_file.path())?;
        assert_eq!(config, loaded);

        Ok(())
    }

    #[test]
    fn test_partial_file_keeps_defaults() -> Result<()> {
        let mut temp_file = NamedTempFile::new()?;
        writeln!(temp_file, "[write]\ncompression = \"stored\"\n\n[general]\nlog_level = \"warn\"")?;

        let config = Config::load(Some(temp_file.path()))?;
        assert_eq!(config.write.compression, "stored");
        assert!(config.write.embed_structure_files);
        assert_eq!(config.general.log_level, "warn");
        assert!(config.load.attach_viewers);

        Ok(())
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let result = Config::load(Some(Path::new("/nonexistent/alnproj.toml")));
        assert!(result.is_err());
    }
}
