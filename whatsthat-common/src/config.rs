//! Configuration loading and root folder resolution
//!
//! Bootstrap settings come from three places, highest priority first:
//! 1. Command-line argument / environment variable (handled by the binary)
//! 2. TOML config file
//! 3. OS-dependent compiled default

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "WHATSTHAT_ROOT_FOLDER";

/// Environment variable overriding the config file location
pub const CONFIG_FILE_ENV: &str = "WHATSTHAT_CONFIG";

const APP_DIR: &str = "whatsthat";

/// Which [`VenueStore`](crate::VenueStore) backend to run with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// One JSON document per logical table under `<root>/data`
    #[default]
    Json,
    /// `<root>/whatsthat.db`
    Sqlite,
    /// Nothing persisted
    Memory,
}

impl std::str::FromStr for StorageBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(StorageBackend::Json),
            "sqlite" => Ok(StorageBackend::Sqlite),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(Error::Config(format!(
                "Unknown storage backend '{}' (expected json, sqlite or memory)",
                other
            ))),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Contents of `config.toml`; every key is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub bind_address: Option<String>,
    /// Externally reachable origin, e.g. `https://songs.example.com`
    pub public_base_url: Option<String>,
    pub storage: Option<StorageBackend>,
    pub suno_api_base: Option<String>,
    pub suno_api_key: Option<String>,
    pub openai_api_base: Option<String>,
    pub openai_api_key: Option<String>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Default config file path (`<config_dir>/whatsthat/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join("config.toml"))
}

/// Load a TOML config file.
///
/// A missing file is not an error: a warning is logged and defaults are
/// returned. A file that exists but does not parse is a configuration error.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            "Config file not found at {}, using defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    info!("Loaded config from {}", path.display());
    Ok(config)
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("./whatsthat_data"))
}

/// Resolves the root folder holding all persistent data
#[derive(Debug, Clone, Default)]
pub struct RootFolderResolver {
    cli_arg: Option<PathBuf>,
    toml_value: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value from the command line (clap also fills this from [`ROOT_FOLDER_ENV`])
    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    pub fn with_toml(mut self, config: &TomlConfig) -> Self {
        self.toml_value = config.root_folder.clone();
        self
    }

    /// Resolve in priority order: CLI/env → TOML → compiled default
    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }
        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }
        if let Some(path) = &self.toml_value {
            return path.clone();
        }
        default_root_folder()
    }
}

/// Creates the root folder layout on first run
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of the JSON documents
    pub fn data_dir(&self) -> PathBuf {
        self.root.join("data")
    }

    /// Directory of archived guest messages
    pub fn messages_dir(&self) -> PathBuf {
        self.root.join("messages")
    }

    pub fn database_path(&self) -> PathBuf {
        self.root.join("whatsthat.db")
    }

    /// Create root, data and messages directories if missing
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [self.root.clone(), self.data_dir(), self.messages_dir()] {
            if !dir.exists() {
                std::fs::create_dir_all(&dir)?;
                info!("Created directory: {}", dir.display());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_backend_from_str() {
        assert_eq!("json".parse::<StorageBackend>().unwrap(), StorageBackend::Json);
        assert_eq!(" SQLite ".parse::<StorageBackend>().unwrap(), StorageBackend::Sqlite);
        assert_eq!("memory".parse::<StorageBackend>().unwrap(), StorageBackend::Memory);
        assert!("postgres".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn test_initializer_layout() {
        let init = RootFolderInitializer::new(PathBuf::from("/srv/whatsthat"));
        assert_eq!(init.data_dir(), PathBuf::from("/srv/whatsthat/data"));
        assert_eq!(init.messages_dir(), PathBuf::from("/srv/whatsthat/messages"));
        assert_eq!(init.database_path(), PathBuf::from("/srv/whatsthat/whatsthat.db"));
    }

    #[test]
    fn test_default_root_folder_is_app_specific() {
        let root = default_root_folder();
        assert!(root.to_string_lossy().contains("whatsthat"));
    }
}
