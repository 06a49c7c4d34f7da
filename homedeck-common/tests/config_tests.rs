//! Unit tests for bootstrap configuration loading
//!
//! Covers:
//! - Explicit config files are parsed and must exist
//! - Malformed TOML is reported as a configuration error
//! - A missing default config file falls back to built-in defaults
//!
//! Tests that manipulate XDG_CONFIG_HOME are marked #[serial] so they never
//! race each other.

use homedeck_common::config::{load_or_default, load_toml_config, ConfigSource};
use homedeck_common::Error;
use serial_test::serial;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_load_explicit_config_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
        port = 8088
        media_root = "/srv/music"
        browse_root = "/srv/share"

        [acquisition]
        program = "/usr/local/bin/spotdl"
        args = ["download"]

        [stats]
        disk_path = "/mnt/hdd"

        [logging]
        level = "debug"
        "#,
    )
    .unwrap();

    let (config, source) = load_or_default(Some(&path)).expect("explicit config should load");

    assert_eq!(source, ConfigSource::File(path.clone()));
    assert_eq!(config.port, Some(8088));
    assert_eq!(config.media_root, Some(PathBuf::from("/srv/music")));
    assert_eq!(config.browse_root, Some(PathBuf::from("/srv/share")));
    assert_eq!(config.acquisition.program, "/usr/local/bin/spotdl");
    assert_eq!(config.acquisition.args, vec!["download".to_string()]);
    assert_eq!(config.stats.disk_path, "/mnt/hdd");
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_missing_explicit_config_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("does-not-exist.toml");

    let result = load_or_default(Some(&path));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_malformed_toml_is_a_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(&path, "port = \"not a number\"").unwrap();

    let result = load_toml_config(&path);
    assert!(matches!(result, Err(Error::Config(_))));
}

#[cfg(target_os = "linux")]
#[test]
#[serial]
fn test_missing_default_config_uses_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let previous = std::env::var_os("XDG_CONFIG_HOME");
    std::env::set_var("XDG_CONFIG_HOME", temp_dir.path());

    let (config, source) = load_or_default(None).expect("missing default config should not fail");
    assert_eq!(
        source,
        ConfigSource::Defaults(Some(temp_dir.path().join("homedeck").join("config.toml")))
    );
    assert!(config.media_root.is_none());
    assert_eq!(config.acquisition.program, "spotdl");

    match previous {
        Some(value) => std::env::set_var("XDG_CONFIG_HOME", value),
        None => std::env::remove_var("XDG_CONFIG_HOME"),
    }
}

#[cfg(target_os = "linux")]
#[test]
#[serial]
fn test_default_config_file_is_picked_up() {
    let temp_dir = TempDir::new().unwrap();
    let config_dir = temp_dir.path().join("homedeck");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(config_dir.join("config.toml"), "port = 9001").unwrap();

    let previous = std::env::var_os("XDG_CONFIG_HOME");
    std::env::set_var("XDG_CONFIG_HOME", temp_dir.path());

    let (config, source) = load_or_default(None).expect("default config should load");
    assert!(matches!(source, ConfigSource::File(_)));
    assert_eq!(config.port, Some(9001));

    match previous {
        Some(value) => std::env::set_var("XDG_CONFIG_HOME", value),
        None => std::env::remove_var("XDG_CONFIG_HOME"),
    }
}
