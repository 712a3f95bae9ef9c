//! Unit tests for configuration and graceful degradation
//!
//! Uses serial_test to prevent environment variable races: tests that touch
//! HINV_ROOT_FOLDER or HINV_ROOT are marked #[serial].

use hinv_common::config::{
    load_toml_config, read_toml_config, CompiledDefaults, RootFolderInitializer,
    RootFolderResolver, TomlConfig, DEFAULT_PORT,
};
use serial_test::serial;
use std::env;
use std::path::PathBuf;

fn clear_root_env() {
    env::remove_var("HINV_ROOT_FOLDER");
    env::remove_var("HINV_ROOT");
}

#[test]
fn test_compiled_defaults_for_current_platform() {
    let defaults = CompiledDefaults::for_current_platform();

    assert!(!defaults.root_folder.as_os_str().is_empty());
    assert!(defaults.root_folder.ends_with("hinv") || defaults.root_folder.ends_with("hinv_data"));
    assert_eq!(defaults.log_level, "info");
    assert_eq!(defaults.port, DEFAULT_PORT);
}

#[test]
#[serial]
fn test_resolver_with_no_overrides_uses_default() {
    clear_root_env();

    let root_folder = RootFolderResolver::new("test-module").resolve();

    assert_eq!(root_folder, CompiledDefaults::for_current_platform().root_folder);
}

#[test]
#[serial]
fn test_resolver_env_var_root_folder() {
    clear_root_env();
    env::set_var("HINV_ROOT_FOLDER", "/tmp/hinv-test-env-folder");

    let root_folder = RootFolderResolver::new("test-module").resolve();
    assert_eq!(root_folder, PathBuf::from("/tmp/hinv-test-env-folder"));

    clear_root_env();
}

#[test]
#[serial]
fn test_resolver_root_folder_takes_precedence_over_root() {
    clear_root_env();
    env::set_var("HINV_ROOT_FOLDER", "/tmp/hinv-priority-1");
    env::set_var("HINV_ROOT", "/tmp/hinv-priority-2");

    let root_folder = RootFolderResolver::new("test-module").resolve();
    assert_eq!(root_folder, PathBuf::from("/tmp/hinv-priority-1"));

    clear_root_env();
}

#[test]
#[serial]
fn test_cli_arg_beats_environment_and_toml() {
    clear_root_env();
    env::set_var("HINV_ROOT", "/tmp/hinv-from-env");

    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/hinv-from-toml")),
        ..Default::default()
    };
    let root_folder = RootFolderResolver::new("test-module")
        .with_toml_config(&toml)
        .with_cli_arg(Some(PathBuf::from("/tmp/hinv-from-cli")))
        .resolve();
    assert_eq!(root_folder, PathBuf::from("/tmp/hinv-from-cli"));

    clear_root_env();
}

#[test]
#[serial]
fn test_toml_root_used_without_env() {
    clear_root_env();

    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/hinv-from-toml")),
        ..Default::default()
    };
    let root_folder = RootFolderResolver::new("test-module")
        .with_toml_config(&toml)
        .resolve();
    assert_eq!(root_folder, PathBuf::from("/tmp/hinv-from-toml"));
}

#[test]
fn test_initializer_creates_layout() {
    let temp = tempfile::tempdir().unwrap();
    let root = temp.path().join("fresh-root");

    let initializer = RootFolderInitializer::new(root.clone());
    initializer.ensure_directory_exists().unwrap();

    let layout = initializer.layout();
    assert!(layout.root_dir.is_dir());
    assert!(layout.instance_dir.is_dir());
    assert!(layout.upload_dir.is_dir());
    assert_eq!(layout.instance_dir, root.join("instance"));

    // Second call is a no-op
    initializer.ensure_directory_exists().unwrap();
}

#[test]
fn test_missing_explicit_config_falls_back_to_defaults() {
    let temp = tempfile::tempdir().unwrap();
    let loaded = load_toml_config(Some(&temp.path().join("absent.toml")));
    assert!(loaded.warning.is_some());
    assert!(loaded.source.is_none());

    let config = loaded.config;
    assert!(config.root_folder.is_none());
    assert!(config.database_url.is_none());
    assert_eq!(config.lookup.timeout_secs, 5);
}

#[test]
fn test_malformed_config_falls_back_to_defaults() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("config.toml");
    std::fs::write(&path, "port = \"not a number").unwrap();

    assert!(read_toml_config(&path).is_err());
    let loaded = load_toml_config(Some(&path));
    assert!(loaded.warning.unwrap().contains("Parse TOML failed"));
    assert!(loaded.config.port.is_none());
}

#[test]
fn test_full_config_file_parsed() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
root_folder = "/srv/hinv"
database_url = "sqlite:///inventory.db"
bind_address = "0.0.0.0"
port = 8081

[logging]
level = "debug"

[lookup]
discogs_url = "http://localhost:9999"
timeout_secs = 2

[backup]
lock_release_pause_ms = 50
"#,
    )
    .unwrap();

    let loaded = load_toml_config(Some(&path));
    assert_eq!(loaded.source.as_deref(), Some(path.as_path()));
    assert!(loaded.warning.is_none());

    let config = loaded.config;
    assert_eq!(config.root_folder, Some(PathBuf::from("/srv/hinv")));
    assert_eq!(config.database_url.as_deref(), Some("sqlite:///inventory.db"));
    assert_eq!(config.port, Some(8081));
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.lookup.discogs_url, "http://localhost:9999");
    assert_eq!(config.lookup.google_books_url, "https://www.googleapis.com");
    assert_eq!(config.lookup.timeout_secs, 2);
    assert_eq!(config.backup.lock_release_pause_ms, 50);
}
