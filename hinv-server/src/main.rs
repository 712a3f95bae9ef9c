//! hinv-server - home inventory service
//!
//! Serves the JSON API for media items, locations and users, resolves
//! scanned barcodes against public catalogs and creates or restores backup
//! archives of the store and the upload directory.

use std::fs::OpenOptions;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use hinv_common::config::{load_toml_config, RootFolderInitializer, RootFolderResolver, DEFAULT_PORT};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use hinv_server::db::Database;
use hinv_server::services::backup::BackupManager;
use hinv_server::services::images::ImageStore;
use hinv_server::services::lookup::{MetadataResolver, SettingsSource};
use hinv_server::AppState;

/// Command-line arguments for hinv-server
#[derive(Parser, Debug)]
#[command(name = "hinv-server")]
#[command(about = "Home inventory server")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "HINV_PORT")]
    port: Option<u16>,

    /// Root folder holding instance/ and static/uploads/
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Path to config.toml
    #[arg(short, long, env = "HINV_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let loaded = load_toml_config(args.config.as_deref());
    let config = loaded.config;

    init_tracing(&config.logging.level, config.logging.file.as_ref())?;

    info!(
        "Starting hinv-server v{} (git {}, built {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE"),
    );
    if let Some(warning) = &loaded.warning {
        warn!("{}", warning);
    }
    if let Some(source) = &loaded.source {
        info!("Config file: {}", source.display());
    }

    // Step 1: Resolve and create the root folder
    let root_folder = RootFolderResolver::new("hinv-server")
        .with_cli_arg(args.root_folder)
        .with_toml_config(&config)
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;
    let layout = initializer.layout().clone();
    info!("Root folder: {}", layout.root_dir.display());

    // Step 2: Open the store named by the database URL
    let database_url = config
        .database_url
        .clone()
        .unwrap_or_else(|| layout.default_database_url());
    let backups = BackupManager::new(
        layout.clone(),
        database_url.clone(),
        Duration::from_millis(config.backup.lock_release_pause_ms),
    );
    let db_path = backups
        .store_destination_path()
        .with_context(|| format!("Unsupported database URL: {}", database_url))?;
    let db = Database::open(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    info!("Database: {}", db_path.display());

    // Step 3: Services
    let settings: Arc<dyn SettingsSource> = Arc::new(db.clone());
    let resolver = MetadataResolver::with_default_providers(&config.lookup, settings)
        .context("Failed to build catalog clients")?;
    let images = ImageStore::new(&layout.upload_dir, config.lookup.image_timeout_secs)
        .context("Failed to build image downloader")?;

    let state = AppState::new(db, resolver, backups, images);
    let app = hinv_server::build_router(state);

    let bind_address = config.bind_address.as_deref().unwrap_or("0.0.0.0");
    let port = args.port.or(config.port).unwrap_or(DEFAULT_PORT);
    let addr: SocketAddr = format!("{}:{}", bind_address, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", bind_address, port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Console logging, plus a plain-text copy when a log file is configured
///
/// `RUST_LOG` takes precedence over the configured level.
fn init_tracing(level: &str, file: Option<&PathBuf>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "hinv_server={level},hinv_common={level},tower_http={level}"
        ))
    });

    let file_layer = match file {
        Some(path) => {
            let log_file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(std::sync::Mutex::new(log_file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
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
