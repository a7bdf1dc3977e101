//! Tests for configuration resolution
//!
//! Environment-mutating tests are serialized.

use pte_common::config::{
    resolve_root_folder, TomlConfig, ENV_ORACLE_API_KEY, ENV_ORACLE_ENDPOINT, ENV_ROOT_FOLDER,
};
use serial_test::serial;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[test]
#[serial]
fn test_env_root_folder_beats_toml() {
    std::env::set_var(ENV_ROOT_FOLDER, "/from/env");
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/from/toml")),
        ..Default::default()
    };

    let resolved = resolve_root_folder(None, &config);
    std::env::remove_var(ENV_ROOT_FOLDER);

    assert_eq!(resolved, PathBuf::from("/from/env"));
}

#[test]
#[serial]
fn test_toml_root_folder_used_without_env() {
    std::env::remove_var(ENV_ROOT_FOLDER);
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/from/toml")),
        ..Default::default()
    };

    assert_eq!(resolve_root_folder(None, &config), PathBuf::from("/from/toml"));
}

#[test]
#[serial]
fn test_env_overrides_oracle_settings() {
    std::env::set_var(ENV_ORACLE_API_KEY, "env-key");
    std::env::set_var(ENV_ORACLE_ENDPOINT, "https://oracle.example.com/assess");

    let mut config = TomlConfig::parse(
        r#"
        [oracle]
        api_key = "toml-key"
        timeout_ms = 2000
        "#,
    )
    .unwrap();
    config.apply_env_overrides();

    std::env::remove_var(ENV_ORACLE_API_KEY);
    std::env::remove_var(ENV_ORACLE_ENDPOINT);

    assert_eq!(config.oracle.api_key.as_deref(), Some("env-key"));
    assert_eq!(config.oracle.endpoint.as_deref(), Some("https://oracle.example.com/assess"));
    assert_eq!(config.oracle.timeout_ms, 2000);
}

#[test]
#[serial]
fn test_blank_env_key_ignored() {
    std::env::set_var(ENV_ORACLE_API_KEY, "   ");
    let mut config = TomlConfig::default();
    config.oracle.api_key = Some("toml-key".to_string());
    config.apply_env_overrides();
    std::env::remove_var(ENV_ORACLE_API_KEY);

    assert_eq!(config.oracle.api_key.as_deref(), Some("toml-key"));
}

#[test]
fn test_load_explicit_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("pte-scoring.toml");
    std::fs::write(
        &path,
        r#"
        root_folder = "/var/lib/pte"

        [logging]
        level = "debug"

        [pipeline]
        sweep_interval_secs = 30
        hourly_submission_limit = 5
        "#,
    )
    .unwrap();

    let config = TomlConfig::load_or_default(Some(&path)).unwrap();
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.pipeline.sweep_interval_secs, 30);
    assert_eq!(config.pipeline.hourly_submission_limit, 5);
    assert_eq!(config.database_path(Path::new("/var/lib/pte")), PathBuf::from("/var/lib/pte/pte.db"));
}

#[test]
fn test_missing_explicit_file_is_error() {
    let result = TomlConfig::load_or_default(Some(Path::new("/definitely/not/here.toml")));
    assert!(result.is_err());
}
