//! Run settings (testup.toml)

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Narrowest word-wrap width accepted for reporter output.
pub const MIN_LINE_LENGTH: usize = 20;

/// Bundled reporter selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReporterKind {
    /// TAP version 13
    #[default]
    Tap,
    /// Indented tree with pass/fail marks
    Console,
}

impl ReporterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReporterKind::Tap => "tap",
            ReporterKind::Console => "console",
        }
    }
}

impl fmt::Display for ReporterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReporterKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tap" => Ok(ReporterKind::Tap),
            "console" => Ok(ReporterKind::Console),
            other => Err(ConfigError::InvalidValue {
                field: "reporter".to_string(),
                reason: format!("unknown reporter '{}' (expected 'tap' or 'console')", other),
            }),
        }
    }
}

/// Run configuration from testup.toml
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TestupConfig {
    /// Reporter used when none is given on the command line
    pub reporter: ReporterKind,

    /// Report suite-level errors through the reporter instead of aborting
    pub report_errors: bool,

    /// Shared output settings
    pub output: OutputConfig,

    /// Console reporter settings
    pub console: ConsoleConfig,
}

impl Default for TestupConfig {
    fn default() -> Self {
        Self {
            reporter: ReporterKind::default(),
            report_errors: true,
            output: OutputConfig::default(),
            console: ConsoleConfig::default(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Word-wrap width of TAP output (default: 80)
    pub line_length: usize,

    /// Colorize output (default: true)
    pub color: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            line_length: 80,
            color: true,
        }
    }
}

/// Console reporter configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConsoleConfig {
    /// Indentation per nesting level (default: two spaces)
    pub indent: String,

    pub success_mark: String,

    pub failure_mark: String,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            indent: "  ".to_string(),
            success_mark: "✓".to_string(),
            failure_mark: "✖".to_string(),
        }
    }
}

impl TestupConfig {
    /// Load configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            file: path.to_path_buf(),
            error: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.output.line_length < MIN_LINE_LENGTH {
            return Err(ConfigError::InvalidValue {
                field: "output.line_length".to_string(),
                reason: format!(
                    "{} is too narrow (minimum {})",
                    self.output.line_length, MIN_LINE_LENGTH
                ),
            });
        }

        for (field, mark) in [
            ("console.success_mark", &self.console.success_mark),
            ("console.failure_mark", &self.console.failure_mark),
        ] {
            if mark.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    reason: "mark cannot be empty".to_string(),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
reporter = "console"
report_errors = false

[output]
line_length = 100
color = false

[console]
indent = "    "
success_mark = "+"
failure_mark = "x"
"#;
        let config: TestupConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.reporter, ReporterKind::Console);
        assert!(!config.report_errors);
        assert_eq!(config.output.line_length, 100);
        assert!(!config.output.color);
        assert_eq!(config.console.indent, "    ");
        assert_eq!(config.console.success_mark, "+");
        config.validate().unwrap();
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: TestupConfig = toml::from_str("").unwrap();
        assert_eq!(config, TestupConfig::default());
        assert_eq!(config.reporter, ReporterKind::Tap);
        assert!(config.report_errors);
        assert_eq!(config.output.line_length, 80);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<TestupConfig, _> = toml::from_str("parallel = true");
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_reporter_rejected() {
        let result: Result<TestupConfig, _> = toml::from_str(r#"reporter = "junit""#);
        assert!(result.is_err());
    }

    #[test]
    fn test_narrow_line_length_rejected() {
        let mut config = TestupConfig::default();
        config.output.line_length = 10;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field, .. }) if field == "output.line_length"
        ));
    }

    #[test]
    fn test_empty_mark_rejected() {
        let mut config = TestupConfig::default();
        config.console.failure_mark = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[rstest]
    #[case("tap", ReporterKind::Tap)]
    #[case("TAP", ReporterKind::Tap)]
    #[case(" console ", ReporterKind::Console)]
    fn test_reporter_from_str(#[case] input: &str, #[case] expected: ReporterKind) {
        assert_eq!(input.parse::<ReporterKind>().unwrap(), expected);
    }

    #[test]
    fn test_reporter_from_str_unknown() {
        assert!("dots".parse::<ReporterKind>().is_err());
    }
}
