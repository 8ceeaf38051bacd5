//! Service configuration resolution
//!
//! Merges command-line/environment overrides with the TOML file and the
//! compiled defaults into one [`ServiceConfig`].

use std::path::PathBuf;

use tracing::{info, warn};
use whatsthat_common::config::{RootFolderResolver, StorageBackend, TomlConfig};

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:5000";
pub const DEFAULT_SUNO_API_BASE: &str = "https://api.sunoapi.org";
pub const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com";

pub const SUNO_API_KEY_ENV: &str = "SUNO_API_KEY";
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Values given on the command line (or their environment variables)
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub root_folder: Option<PathBuf>,
    pub bind_address: Option<String>,
    pub public_base_url: Option<String>,
    pub storage: Option<StorageBackend>,
    pub log_level: Option<String>,
}

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub root_folder: PathBuf,
    pub bind_address: String,
    /// Externally reachable origin; `None` derives it from each request's Host
    pub public_base_url: Option<String>,
    pub storage: StorageBackend,
    pub suno_api_base: String,
    pub suno_api_key: Option<String>,
    pub openai_api_base: String,
    pub openai_api_key: Option<String>,
    pub log_level: String,
}

impl ServiceConfig {
    /// Resolve every setting: CLI/env → TOML → compiled default
    pub fn resolve(cli: CliOverrides, toml: &TomlConfig) -> Self {
        let root_folder = RootFolderResolver::new()
            .with_cli_arg(cli.root_folder)
            .with_toml(toml)
            .resolve();

        let public_base_url = non_blank(cli.public_base_url)
            .or_else(|| non_blank(toml.public_base_url.clone()))
            .map(|url| url.trim_end_matches('/').to_string());

        Self {
            root_folder,
            bind_address: non_blank(cli.bind_address)
                .or_else(|| non_blank(toml.bind_address.clone()))
                .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string()),
            public_base_url,
            storage: cli.storage.or(toml.storage).unwrap_or_default(),
            suno_api_base: non_blank(toml.suno_api_base.clone())
                .unwrap_or_else(|| DEFAULT_SUNO_API_BASE.to_string()),
            suno_api_key: resolve_api_key(
                "Suno",
                std::env::var(SUNO_API_KEY_ENV).ok(),
                toml.suno_api_key.as_deref(),
            ),
            openai_api_base: non_blank(toml.openai_api_base.clone())
                .unwrap_or_else(|| DEFAULT_OPENAI_API_BASE.to_string()),
            openai_api_key: resolve_api_key(
                "OpenAI",
                std::env::var(OPENAI_API_KEY_ENV).ok(),
                toml.openai_api_key.as_deref(),
            ),
            log_level: non_blank(cli.log_level).unwrap_or_else(|| toml.logging.level.clone()),
        }
    }
}

/// Pick an API key: environment first, then TOML.
///
/// Blank values count as unset. A warning is logged when both sources
/// carry a key.
pub fn resolve_api_key(
    service: &str,
    env_value: Option<String>,
    toml_value: Option<&str>,
) -> Option<String> {
    let env_key = non_blank(env_value);
    let toml_key = non_blank(toml_value.map(str::to_string));

    match (env_key, toml_key) {
        (Some(env_key), Some(_)) => {
            warn!(
                "{} API key found in environment and TOML config. Using environment.",
                service
            );
            Some(env_key)
        }
        (Some(env_key), None) => {
            info!("{} API key loaded from environment variable", service);
            Some(env_key)
        }
        (None, Some(toml_key)) => {
            info!("{} API key loaded from TOML config", service);
            Some(toml_key)
        }
        (None, None) => {
            warn!("{} API key not configured", service);
            None
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
