//! Configuration loading and precedence tests

use pretty_assertions::assert_eq;
use serial_test::serial;
use std::env;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use testup_config::{ConfigError, ConfigLoader, ReporterKind, TestupConfig, CONFIG_FILE_NAME};

fn create_config_file(dir: &Path, content: &str) -> std::path::PathBuf {
    let config_path = dir.join(CONFIG_FILE_NAME);
    fs::write(&config_path, content).unwrap();
    config_path
}

// ============================================================================
// Config Loading Tests
// ============================================================================

#[test]
#[serial]
fn test_load_project_config_basic() {
    let temp_dir = TempDir::new().unwrap();
    let content = r#"
reporter = "console"

[console]
success_mark = "ok"
"#;
    create_config_file(temp_dir.path(), content);

    let config = ConfigLoader::new()
        .without_env()
        .load_from_directory(temp_dir.path())
        .unwrap();

    assert!(config.is_project());
    assert_eq!(config.settings.reporter, ReporterKind::Console);
    assert_eq!(config.settings.console.success_mark, "ok");
    assert_eq!(config.settings.console.failure_mark, "✖");
}

#[test]
fn test_load_when_no_config_exists() {
    let temp_dir = TempDir::new().unwrap();

    let config = ConfigLoader::new()
        .without_env()
        .load_from_directory(temp_dir.path())
        .unwrap();

    assert!(!config.is_project());
    assert_eq!(config.settings, TestupConfig::default());
}

#[test]
fn test_load_from_subdirectory_finds_parent() {
    let temp_dir = TempDir::new().unwrap();
    create_config_file(temp_dir.path(), "report_errors = false\n");

    let sub1 = temp_dir.path().join("sub1");
    let sub2 = sub1.join("sub2");
    fs::create_dir_all(&sub2).unwrap();

    let config = ConfigLoader::new()
        .without_env()
        .load_from_directory(&sub2)
        .unwrap();

    assert!(!config.settings.report_errors);
    assert_eq!(config.project_root(), Some(temp_dir.path()));
}

#[test]
fn test_nearest_config_wins() {
    let temp_dir = TempDir::new().unwrap();
    create_config_file(temp_dir.path(), "reporter = \"console\"\n");

    let nested = temp_dir.path().join("nested");
    fs::create_dir(&nested).unwrap();
    create_config_file(&nested, "reporter = \"tap\"\n");

    let config = ConfigLoader::new()
        .without_env()
        .load_from_directory(&nested)
        .unwrap();

    assert_eq!(config.settings.reporter, ReporterKind::Tap);
    assert_eq!(config.project_root(), Some(nested.as_path()));
}

#[test]
fn test_load_from_specific_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = create_config_file(temp_dir.path(), "[output]\nline_length = 120\n");

    let config = ConfigLoader::new()
        .without_env()
        .load_from_file(&config_path)
        .unwrap();

    assert_eq!(config.settings.output.line_length, 120);
    assert_eq!(config.project_root(), Some(temp_dir.path()));
}

// ============================================================================
// Invalid Config Tests
// ============================================================================

#[test]
fn test_missing_file_is_not_found() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("nope.toml");

    let result = ConfigLoader::new().without_env().load_from_file(&missing);

    assert!(matches!(result, Err(ConfigError::NotFound(path)) if path == missing));
}

#[test]
fn test_invalid_toml_syntax() {
    let temp_dir = TempDir::new().unwrap();
    create_config_file(temp_dir.path(), "reporter = \n");

    let result = ConfigLoader::new()
        .without_env()
        .load_from_directory(temp_dir.path());

    assert!(matches!(result, Err(ConfigError::TomlParseError { .. })));
}

#[test]
fn test_unknown_section_rejected() {
    let temp_dir = TempDir::new().unwrap();
    create_config_file(temp_dir.path(), "[retry]\ncount = 3\n");

    let result = ConfigLoader::new()
        .without_env()
        .load_from_directory(temp_dir.path());

    assert!(matches!(result, Err(ConfigError::TomlParseError { .. })));
}

#[test]
fn test_too_narrow_line_length_rejected() {
    let temp_dir = TempDir::new().unwrap();
    create_config_file(temp_dir.path(), "[output]\nline_length = 4\n");

    let result = ConfigLoader::new()
        .without_env()
        .load_from_directory(temp_dir.path());

    let err = result.unwrap_err();
    assert!(err.to_string().contains("output.line_length"));
}

// ============================================================================
// Precedence Tests
// ============================================================================

#[test]
#[serial]
fn test_env_overrides_file() {
    let temp_dir = TempDir::new().unwrap();
    create_config_file(
        temp_dir.path(),
        "reporter = \"console\"\nreport_errors = true\n[output]\nline_length = 60\n",
    );

    env::set_var("TESTUP_REPORTER", "tap");
    env::set_var("TESTUP_REPORT_ERRORS", "no");
    env::set_var("TESTUP_LINE_LENGTH", "132");

    let result = ConfigLoader::new().load_from_directory(temp_dir.path());

    env::remove_var("TESTUP_REPORTER");
    env::remove_var("TESTUP_REPORT_ERRORS");
    env::remove_var("TESTUP_LINE_LENGTH");

    let settings = result.unwrap().settings;
    assert_eq!(settings.reporter, ReporterKind::Tap);
    assert!(!settings.report_errors);
    assert_eq!(settings.output.line_length, 132);
}

#[test]
#[serial]
fn test_env_unknown_reporter_rejected() {
    let temp_dir = TempDir::new().unwrap();

    env::set_var("TESTUP_REPORTER", "junit");
    let result = ConfigLoader::new().load_from_directory(temp_dir.path());
    env::remove_var("TESTUP_REPORTER");

    assert!(matches!(result, Err(ConfigError::InvalidValue { field, .. }) if field == "reporter"));
}
