//! Configuration types

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::transport::DEFAULT_MAX_FRAME_BYTES;
use minic_core::symtab::{DEFAULT_CAPACITY, REGISTER_COUNT};

/// Configuration error type
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Server settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Log level: trace, debug, info, warn or error
    pub log_level: String,

    /// Terminate with the matching exit code on content, capacity and
    /// missing-document errors instead of recovering
    pub strict_exit: bool,

    /// Upper bound on simultaneously open documents
    pub max_documents: Option<usize>,

    /// Symbol table entries per pass, registers included
    pub symbol_table_capacity: usize,

    /// Largest accepted message body in bytes
    pub max_frame_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            strict_exit: false,
            max_documents: None,
            symbol_table_capacity: DEFAULT_CAPACITY,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

impl ServerConfig {
    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "unknown log level '{}', expected one of {}",
                self.log_level,
                LOG_LEVELS.join(", ")
            )));
        }

        if self.symbol_table_capacity <= REGISTER_COUNT {
            return Err(ConfigError::ValidationError(format!(
                "symbol_table_capacity must exceed the {} reserved registers",
                REGISTER_COUNT
            )));
        }

        if self.max_documents == Some(0) {
            return Err(ConfigError::ValidationError(
                "max_documents must be at least 1".to_string(),
            ));
        }

        if self.max_frame_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "max_frame_bytes must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
