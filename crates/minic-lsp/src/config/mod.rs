//! Server configuration
//!
//! Settings are read from a YAML or JSON file and validated before the
//! server starts. Every field has a default, so an empty file is valid.

pub mod loader;
pub mod types;

pub use loader::ConfigLoader;
pub use types::{ConfigError, ConfigResult, ServerConfig};
