use std::fs;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

pub const CONFIG_ENV_VAR: &str = "UNI_TOOLKIT_CONFIG";
pub const DEFAULT_STORAGE_KEY: &str = "events_handlers";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read toolkit config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Tunables for the event registry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ToolkitConfig {
    /// Store key under which an owner's handler set lives.
    pub storage_key: String,
    /// `bubbles` flag used by `Registry::fire` for node owners.
    pub default_bubbles: bool,
    /// `cancelable` flag used by `Registry::fire` for node owners.
    pub default_cancelable: bool,
}

impl Default for ToolkitConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            default_bubbles: true,
            default_cancelable: false,
        }
    }
}

impl ToolkitConfig {
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        match config_path {
            Some(path) if path.exists() => {
                let contents = fs::read_to_string(path)?;
                Ok(serde_yaml::from_str(&contents)?)
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from);
        Self::load(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn loads_default() {
        let config = ToolkitConfig::load(None).unwrap();
        assert_eq!(config.storage_key, "events_handlers");
        assert!(config.default_bubbles);
        assert!(!config.default_cancelable);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = ToolkitConfig::load(Some(PathBuf::from("/nonexistent/uni.yaml"))).unwrap();
        assert_eq!(config, ToolkitConfig::default());
    }

    #[test]
    fn loads_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        use std::io::Write;
        writeln!(file, "storage_key: handlers\ndefault_cancelable: true").unwrap();
        let config = ToolkitConfig::load(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.storage_key, "handlers");
        assert!(config.default_bubbles);
        assert!(config.default_cancelable);
    }

    #[test]
    fn from_env_reads_configured_path() {
        let mut file = NamedTempFile::new().unwrap();
        use std::io::Write;
        writeln!(file, "storage_key: from_env\ndefault_bubbles: false").unwrap();

        std::env::set_var(CONFIG_ENV_VAR, file.path());
        let config = ToolkitConfig::from_env();
        std::env::remove_var(CONFIG_ENV_VAR);

        let config = config.unwrap();
        assert_eq!(config.storage_key, "from_env");
        assert!(!config.default_bubbles);
        assert!(!config.default_cancelable);
    }

    #[test]
    fn rejects_malformed_yaml() {
        let mut file = NamedTempFile::new().unwrap();
        use std::io::Write;
        writeln!(file, "default_bubbles: [not, a, bool]").unwrap();
        let err = ToolkitConfig::load(Some(file.path().to_path_buf())).unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }
}
