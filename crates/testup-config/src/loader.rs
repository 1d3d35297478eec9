//! Configuration Loader
//!
//! Finds and loads `testup.toml`, then applies environment overrides.

use crate::settings::TestupConfig;
use crate::{ConfigError, ConfigResult};
use std::env;
use std::path::{Path, PathBuf};

/// Name of the project configuration file
pub const CONFIG_FILE_NAME: &str = "testup.toml";

/// Configuration loader
///
/// Precedence, lowest first:
/// 1. Built-in defaults
/// 2. Project config (testup.toml)
/// 3. Environment variables (TESTUP_*)
/// 4. CLI flags (handled by caller)
#[derive(Debug, Default)]
pub struct ConfigLoader {
    /// Skip TESTUP_* environment overrides
    ignore_env: bool,
}

/// Loaded configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub settings: TestupConfig,

    /// Directory where testup.toml was found
    pub project_root: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Do not read TESTUP_* environment variables
    pub fn without_env(mut self) -> Self {
        self.ignore_env = true;
        self
    }

    /// Load configuration starting from the given directory
    ///
    /// Walks up the directory tree to the first testup.toml. Without one the
    /// defaults are used and there is no project root.
    pub fn load_from_directory(&self, start_dir: &Path) -> ConfigResult<Config> {
        let (project_root, settings) = self.find_project_config(start_dir)?;
        let settings = self.apply_env_overrides(settings)?;

        Ok(Config {
            settings,
            project_root,
        })
    }

    /// Load configuration from a specific file
    pub fn load_from_file(&self, config_path: &Path) -> ConfigResult<Config> {
        let settings = TestupConfig::load_from_file(config_path)?;
        let settings = self.apply_env_overrides(settings)?;
        let project_root = config_path.parent().map(|p| p.to_path_buf());

        Ok(Config {
            settings,
            project_root,
        })
    }

    fn find_project_config(
        &self,
        start_dir: &Path,
    ) -> ConfigResult<(Option<PathBuf>, TestupConfig)> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(CONFIG_FILE_NAME);

            if config_path.exists() {
                let settings = TestupConfig::load_from_file(&config_path)?;
                return Ok((Some(current), settings));
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => return Ok((None, TestupConfig::default())),
            }
        }
    }

    /// Apply TESTUP_REPORTER, TESTUP_REPORT_ERRORS and TESTUP_LINE_LENGTH
    fn apply_env_overrides(&self, mut config: TestupConfig) -> ConfigResult<TestupConfig> {
        if self.ignore_env {
            return Ok(config);
        }

        if let Ok(reporter) = env::var("TESTUP_REPORTER") {
            config.reporter = reporter.parse()?;
        }

        if let Ok(value) = env::var("TESTUP_REPORT_ERRORS") {
            config.report_errors = parse_bool(&value).ok_or_else(|| ConfigError::InvalidEnv {
                var: "TESTUP_REPORT_ERRORS".to_string(),
                value: value.clone(),
            })?;
        }

        if let Ok(value) = env::var("TESTUP_LINE_LENGTH") {
            config.output.line_length =
                value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                    var: "TESTUP_LINE_LENGTH".to_string(),
                    value: value.clone(),
                })?;
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Config {
    /// Get the project root directory
    pub fn project_root(&self) -> Option<&Path> {
        self.project_root.as_deref()
    }

    /// Check if a testup.toml was found
    pub fn is_project(&self) -> bool {
        self.project_root.is_some()
    }
}
