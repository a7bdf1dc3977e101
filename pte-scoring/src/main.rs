//! PTE Scoring service (pte-scoring) - Main entry point
//!
//! Accepts speaking attempts, scores them asynchronously, and serves credit
//! and progress state over HTTP.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pte_common::config::{resolve_root_folder, TomlConfig};
use pte_common::events::EventBus;
use pte_scoring::oracle::{AssessmentOracle, HttpOracleClient, UnavailableOracle};
use pte_scoring::{build_pipeline, build_router, db, AppState};

const DEFAULT_PORT: u16 = 5730;

/// Command-line arguments for pte-scoring
#[derive(Parser, Debug)]
#[command(name = "pte-scoring")]
#[command(about = "Speaking attempt scoring service")]
#[command(version)]
struct Args {
    /// Port to listen on (default 5730)
    #[arg(short, long, env = "PTE_PORT")]
    port: Option<u16>,

    /// Root folder holding the database
    #[arg(short, long, env = "PTE_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// TOML config file
    #[arg(short, long, env = "PTE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = TomlConfig::load_or_default(args.config.as_deref()).context("Failed to load config")?;
    config.apply_env_overrides();

    let default_filter = format!("pte_scoring={0},pte_common={0},tower_http=info", config.logging.level);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let port = args.port.or(config.port).unwrap_or(DEFAULT_PORT);
    let root_folder = resolve_root_folder(args.root_folder.as_deref(), &config);
    let db_path = config.database_path(&root_folder);

    info!("Starting PTE Scoring on port {}", port);
    info!("Database: {}", db_path.display());

    let pool = db::init_database(&db_path)
        .await
        .context("Failed to initialize database")?;

    let event_bus = EventBus::new(config.pipeline.event_capacity);
    let oracle = build_oracle(&config);

    let pipeline = build_pipeline(pool.clone(), event_bus, oracle, &config);
    let tasks = pipeline.start();

    let app = build_router(AppState::new(pipeline));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tasks.abort();
    pool.close().await;

    info!("Server shutdown complete");
    Ok(())
}

/// HTTP oracle when an endpoint is configured, otherwise heuristics only
fn build_oracle(config: &TomlConfig) -> Arc<dyn AssessmentOracle> {
    let Some(endpoint) = config.oracle.endpoint.as_deref() else {
        warn!("No oracle endpoint configured; scoring with heuristics only");
        return Arc::new(UnavailableOracle);
    };

    match HttpOracleClient::new(
        endpoint,
        config.oracle.api_key.clone(),
        config.oracle.model.clone(),
        std::time::Duration::from_millis(config.oracle.timeout_ms),
    ) {
        Ok(client) => {
            info!("Assessment oracle: {}", endpoint);
            Arc::new(client)
        }
        Err(e) => {
            warn!(error = %e, "Failed to build oracle client; scoring with heuristics only");
            Arc::new(UnavailableOracle)
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
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
                warn!(error = %e, "Failed to install SIGTERM handler");
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
