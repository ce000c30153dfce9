//! tunetag-enrich - Tag enrichment microservice
//!
//! Suggests energy levels from audio analysis, fetches lyrics and
//! track-analysis metrics for albums and playlists, and applies user
//! energy/mood edits to both the audio files and the library database.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};
use tunetag_common::config::{load_or_default, RootFolderResolver, TomlConfig};

use tunetag_enrich::config::ServiceSettings;
use tunetag_enrich::providers::Capabilities;
use tunetag_enrich::AppState;

/// Level used until the config file has been read
const DEFAULT_LOG_LEVEL: &str = "info";

/// `RUST_LOG` when set, otherwise `level` for this service's targets
fn log_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("tunetag_enrich={level},tunetag_common={level},tower_http={level}").into()
    })
}

/// Command-line arguments for tunetag-enrich
#[derive(Parser, Debug)]
#[command(name = "tunetag-enrich")]
#[command(about = "Tag enrichment microservice for the tunetag music library")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "TUNETAG_PORT")]
    port: Option<u16>,

    /// Folder holding the library database
    #[arg(short, long, env = "TUNETAG_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Config file path
    #[arg(short, long, env = "TUNETAG_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Log before the config file is read so its warnings are not lost
    let (filter, filter_handle) = reload::Layer::new(log_filter(DEFAULT_LOG_LEVEL));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let toml_config = load_or_default(args.config.as_deref());
    if let Err(e) = filter_handle.reload(log_filter(&toml_config.logging.level)) {
        warn!("Failed to apply configured log level: {}", e);
    }

    info!("Starting tunetag-enrich");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let root_folder = RootFolderResolver::new(args.root_folder.clone(), &toml_config).resolve();
    info!("Root folder: {}", root_folder.display());

    let db_path = TomlConfig::database_path(&root_folder);
    let db_pool = tunetag_enrich::db::init_database_pool(&db_path)
        .await
        .context("Failed to open library database")?;
    info!("Database connection established");

    let settings = ServiceSettings::from_toml(&toml_config);

    // Probe once; handlers never re-check the environment
    let capabilities = Capabilities::init_global(&settings.probe_settings()).clone();

    let state = AppState::new(db_pool, capabilities, &settings)
        .context("Failed to initialize providers")?;
    let shutdown = state.shutdown.clone();

    let app = tunetag_enrich::build_router(state);

    let addr = toml_config.listen_address(args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Wait for Ctrl-C or SIGTERM, then cancel all in-flight work
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }

    shutdown.cancel();
}
