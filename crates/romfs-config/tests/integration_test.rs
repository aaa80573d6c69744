//! Integration tests for romfs-config
//!
//! These tests verify the full config loading pipeline with real file system operations.

use romfs_config::{Config, ConfigError, LogLevel};
use romfs_path::PathFlags;
use tempfile::tempdir;

/// Test config loading from a real global config file
#[test]
fn test_load_global_config_from_file() {
    let temp = tempdir().unwrap();
    let global = temp.path().join("config.toml");
    std::fs::write(
        &global,
        r#"
[path]
windows_path = true
max_path_length = 64

[table]
directory_buckets = 17

[log]
level = "info"
"#,
    )
    .unwrap();

    let config = Config::load_from(Some(&global), None).unwrap();
    assert_eq!(config.path.flags(), PathFlags::new().allow_windows_path());
    assert_eq!(config.path.max_path_length, 64);
    assert_eq!(config.table.directory_buckets, 17);
    assert_eq!(config.table.file_buckets, 0);
    assert_eq!(config.log.level(), LogLevel::Info);
    assert_eq!(config.build.data_alignment, 16);
}

/// Test config hierarchy: project config overrides global key by key
#[test]
fn test_config_hierarchy_project_overrides_global() {
    let temp = tempdir().unwrap();
    let global = temp.path().join("global.toml");
    let project = temp.path().join("project.toml");
    std::fs::write(&global, "[table]\ndirectory_buckets = 7\nfile_buckets = 9\n").unwrap();
    std::fs::write(&project, "[table]\nfile_buckets = 101\n[build]\nfollow_symlinks = true\n")
        .unwrap();

    let config = Config::load_from(Some(&global), Some(&project)).unwrap();
    assert_eq!(config.table.directory_buckets, 7);
    assert_eq!(config.table.file_buckets, 101);
    assert!(config.build.follow_symlinks);
}

#[test]
fn test_missing_files_yield_defaults() {
    let temp = tempdir().unwrap();
    let config = Config::load_from(Some(&temp.path().join("nope.toml")), None).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_malformed_file_is_an_error() {
    let temp = tempdir().unwrap();
    let bad = temp.path().join("bad.toml");
    std::fs::write(&bad, "[table\n").unwrap();
    assert!(matches!(
        Config::load_from(Some(&bad), None),
        Err(ConfigError::Toml(_))
    ));
}

#[test]
fn test_default_toml_parses_back() {
    let parsed: Config = toml::from_str(&Config::default_toml()).unwrap();
    assert_eq!(parsed, Config::default());
}
