//! Configuration loading and root folder resolution
//!
//! Tests that touch WHATSTHAT_ROOT_FOLDER are marked #[serial] so they never
//! race on the process environment.

use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;
use whatsthat_common::config::{
    default_root_folder, load_toml_config, RootFolderInitializer, RootFolderResolver,
    StorageBackend, TomlConfig, ROOT_FOLDER_ENV,
};

#[test]
#[serial]
fn test_resolver_with_no_overrides_uses_default() {
    env::remove_var(ROOT_FOLDER_ENV);

    let root = RootFolderResolver::new().resolve();
    assert_eq!(root, default_root_folder());
}

#[test]
#[serial]
fn test_cli_arg_beats_env_and_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/from/env");
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/from/toml")),
        ..Default::default()
    };

    let root = RootFolderResolver::new()
        .with_cli_arg(Some(PathBuf::from("/from/cli")))
        .with_toml(&toml)
        .resolve();
    env::remove_var(ROOT_FOLDER_ENV);

    assert_eq!(root, PathBuf::from("/from/cli"));
}

#[test]
#[serial]
fn test_env_beats_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/from/env");
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/from/toml")),
        ..Default::default()
    };

    let root = RootFolderResolver::new().with_toml(&toml).resolve();
    env::remove_var(ROOT_FOLDER_ENV);

    assert_eq!(root, PathBuf::from("/from/env"));
}

#[test]
#[serial]
fn test_blank_env_falls_through_to_toml() {
    env::set_var(ROOT_FOLDER_ENV, "  ");
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/from/toml")),
        ..Default::default()
    };

    let root = RootFolderResolver::new().with_toml(&toml).resolve();
    env::remove_var(ROOT_FOLDER_ENV);

    assert_eq!(root, PathBuf::from("/from/toml"));
}

#[test]
fn test_missing_config_file_yields_defaults() {
    let dir = TempDir::new().unwrap();
    let config = load_toml_config(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(config, TomlConfig::default());
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_full_config_file_parses() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
root_folder = "/srv/whatsthat"
bind_address = "127.0.0.1:8080"
public_base_url = "https://songs.example.com"
storage = "sqlite"
suno_api_base = "https://suno.internal"
suno_api_key = "suno-secret"
openai_api_key = "openai-secret"

[logging]
level = "debug"
"#,
    )
    .unwrap();

    let config = load_toml_config(&path).unwrap();
    assert_eq!(config.root_folder, Some(PathBuf::from("/srv/whatsthat")));
    assert_eq!(config.bind_address.as_deref(), Some("127.0.0.1:8080"));
    assert_eq!(config.storage, Some(StorageBackend::Sqlite));
    assert_eq!(config.suno_api_key.as_deref(), Some("suno-secret"));
    assert_eq!(config.openai_api_base, None);
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_invalid_config_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "storage = [unterminated").unwrap();

    assert!(load_toml_config(&path).is_err());
}

#[test]
fn test_initializer_creates_layout() {
    let dir = TempDir::new().unwrap();
    let init = RootFolderInitializer::new(dir.path().join("root"));

    init.ensure_directories().unwrap();
    assert!(init.data_dir().is_dir());
    assert!(init.messages_dir().is_dir());

    // Second run is a no-op
    init.ensure_directories().unwrap();
}
