//! Phing Configuration System
//!
//! Provides user-level settings for the `phing` command:
//! - Global user configuration (~/.phing/config.toml)
//! - Build file discovery (walking up from a directory)
//! - Environment variable overrides
//!
//! # Configuration Hierarchy
//!
//! Settings are resolved in the following order (later overrides earlier):
//! 1. Built-in defaults
//! 2. Global config (~/.phing/config.toml, or `PHING_CONFIG`)
//! 3. Environment variables (`PHING_LOGGER`, `PHING_BUILDFILE`, `NO_COLOR`)
//! 4. CLI flags
//!
//! # Example
//!
//! ```no_run
//! use phing_config::ConfigLoader;
//!
//! let config = ConfigLoader::new().load().unwrap();
//! println!("logger: {}", config.logger);
//! ```

pub mod global;
pub mod loader;

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Home directory not found")]
    HomeNotFound,
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

// Re-export main types
pub use global::{DefaultsConfig, GlobalConfig, LOGGERS};
pub use loader::{find_build_file, Config, ConfigLoader, DEFAULT_BUILD_FILE};
