//! Testup Configuration
//!
//! Loads the run configuration from `testup.toml`.
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded and merged in the following order (later overrides earlier):
//! 1. Built-in defaults
//! 2. Project config (`testup.toml`, found by walking up from the start directory)
//! 3. Environment variables (`TESTUP_*`)
//! 4. CLI flags (applied by the caller)
//!
//! # Example
//!
//! ```no_run
//! use testup_config::ConfigLoader;
//! use std::path::Path;
//!
//! let loader = ConfigLoader::new();
//! let config = loader.load_from_directory(Path::new(".")).unwrap();
//! println!("reporter: {}", config.settings.reporter);
//! ```

pub mod loader;
pub mod settings;

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

    #[error("Invalid value '{value}' in environment variable {var}")]
    InvalidEnv { var: String, value: String },
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

// Re-export main types
pub use loader::{Config, ConfigLoader, CONFIG_FILE_NAME};
pub use settings::{ConsoleConfig, OutputConfig, ReporterKind, TestupConfig};
