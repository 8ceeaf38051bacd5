//! whatsthat-server - Venue song request service
//!
//! Guests submit prompts, the configured music-generation API renders them,
//! and each venue's playback page follows its queue.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use whatsthat_common::config::{
    default_config_path, load_toml_config, RootFolderInitializer, StorageBackend, TomlConfig,
    CONFIG_FILE_ENV, ROOT_FOLDER_ENV,
};
use whatsthat_common::db::{init_database, SqliteStore};
use whatsthat_common::events::EventBus;
use whatsthat_common::store::{JsonFileStore, MemoryStore};
use whatsthat_common::SharedStore;
use whatsthat_server::config::{CliOverrides, ServiceConfig};
use whatsthat_server::services::{GenerationApi, PromptAssistant, SunoClient};
use whatsthat_server::{build_router, AppState};

/// Command-line arguments for whatsthat-server
#[derive(Parser, Debug)]
#[command(name = "whatsthat-server")]
#[command(about = "Venue song request service")]
#[command(version)]
struct Args {
    /// TOML config file
    #[arg(short, long, env = CONFIG_FILE_ENV)]
    config: Option<PathBuf>,

    /// Root folder holding persistent data
    #[arg(short, long, env = ROOT_FOLDER_ENV)]
    root_folder: Option<PathBuf>,

    /// Address to listen on, e.g. 0.0.0.0:5000
    #[arg(short, long, env = "WHATSTHAT_BIND")]
    bind: Option<String>,

    /// Externally reachable origin used for callback and QR links
    #[arg(long, env = "WHATSTHAT_PUBLIC_BASE_URL")]
    public_base_url: Option<String>,

    /// Store backend: json, sqlite or memory
    #[arg(long, env = "WHATSTHAT_STORAGE")]
    storage: Option<StorageBackend>,

    /// Log level when RUST_LOG is unset
    #[arg(long, env = "WHATSTHAT_LOG_LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().or_else(default_config_path);
    let toml_config = match &config_path {
        Some(path) => load_toml_config(path),
        None => Ok(TomlConfig::default()),
    };

    let log_level = args
        .log_level
        .clone()
        .or_else(|| toml_config.as_ref().ok().map(|c| c.logging.level.clone()))
        .unwrap_or_else(|| "info".to_string());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{},tower_http=info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Build identification first, before any slow startup work
    info!(
        "Starting whatsthat-server v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let toml_config = toml_config.context("Failed to load config file")?;
    if let Some(path) = &config_path {
        info!("Config file: {}", path.display());
    }

    let config = ServiceConfig::resolve(
        CliOverrides {
            root_folder: args.root_folder,
            bind_address: args.bind,
            public_base_url: args.public_base_url,
            storage: args.storage,
            log_level: args.log_level,
        },
        &toml_config,
    );

    info!("Root folder: {}", config.root_folder.display());
    let initializer = RootFolderInitializer::new(config.root_folder.clone());
    initializer
        .ensure_directories()
        .context("Failed to create root folder layout")?;

    let store = open_store(config.storage, &initializer).await?;

    let generation: Option<Arc<dyn GenerationApi>> = match &config.suno_api_key {
        Some(key) => {
            let client = SunoClient::new(&config.suno_api_base, key.clone())
                .context("Failed to build generation client")?;
            info!("Music generation enabled ({})", config.suno_api_base);
            Some(Arc::new(client))
        }
        None => {
            warn!("Music generation disabled: no Suno API key configured");
            None
        }
    };

    let assistant = PromptAssistant::new(&config.openai_api_base, config.openai_api_key.clone())
        .context("Failed to build chat client")?;
    if !assistant.is_enabled() {
        info!("Prompt assistant disabled; using heuristic titles and no venue filter");
    }

    match &config.public_base_url {
        Some(url) => info!("Public base URL: {}", url),
        None => warn!("No public base URL configured; links derive from the request Host header"),
    }

    let state = AppState::new(
        store,
        EventBus::default(),
        generation,
        assistant,
        initializer.messages_dir(),
        config.public_base_url.clone(),
    );
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_address))?;
    info!("whatsthat-server listening on http://{}", config.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Open the configured store backend
async fn open_store(
    backend: StorageBackend,
    initializer: &RootFolderInitializer,
) -> Result<SharedStore> {
    let store: SharedStore = match backend {
        StorageBackend::Json => {
            let dir = initializer.data_dir();
            info!("Storage: JSON documents in {}", dir.display());
            Arc::new(
                JsonFileStore::open(dir)
                    .await
                    .context("Failed to open JSON store")?,
            )
        }
        StorageBackend::Sqlite => {
            let path = initializer.database_path();
            info!("Storage: SQLite database {}", path.display());
            let pool = init_database(&path)
                .await
                .context("Failed to initialize database")?;
            Arc::new(SqliteStore::new(pool))
        }
        StorageBackend::Memory => {
            warn!("Storage: in-memory only, nothing will be persisted");
            Arc::new(MemoryStore::new())
        }
    };
    Ok(store)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
