//! Configuration loader for reading server settings from files

use std::path::Path;

use tracing::debug;

use super::types::{ConfigError, ConfigResult, ServerConfig};

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a YAML file
    pub fn load_yaml(path: &Path) -> ConfigResult<ServerConfig> {
        let content = std::fs::read_to_string(path)?;
        // An empty YAML document is null, not an empty mapping
        let config: ServerConfig = if content.trim().is_empty() {
            ServerConfig::default()
        } else {
            serde_yaml::from_str(&content)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn load_json(path: &Path) -> ConfigResult<ServerConfig> {
        let content = std::fs::read_to_string(path)?;
        let config: ServerConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file (auto-detect format)
    pub fn load(path: &Path) -> ConfigResult<ServerConfig> {
        debug!("Loading configuration from {}", path.display());
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Self::load_yaml(path),
            Some("json") => Self::load_json(path),
            _ => Err(ConfigError::ValidationError(format!(
                "Unsupported configuration file format: {}",
                path.display()
            ))),
        }
    }
}
