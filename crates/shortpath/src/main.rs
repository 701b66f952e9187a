//! # Shortpath - hierarchical short links
//!
//! Maps human-readable paths like `/team/docs` to redirect targets.
//! New links are gated by a small arithmetic challenge and a liveness
//! check of the target.
//!
//! ## Architecture
//! ```text
//! Client → Shortpath → NodeStore (memory | Redis)
//!              ↓
//!        target URL check
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod challenge;
mod config;
mod links;
mod routes;
mod state;
mod storage;

use config::{AppConfig, StorageBackend};
use state::AppState;

/// Shortpath - hierarchical short link service
#[derive(Parser, Debug)]
#[command(name = "shortpath")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/shortpath.toml")]
    config: String,

    /// Listen address (overrides config)
    #[arg(short, long, env = "LISTEN_ADDR")]
    listen: Option<String>,

    /// Public hostname; links back to it are refused (overrides config)
    #[arg(long, env = "PUBLIC_HOST")]
    public_host: Option<String>,

    /// Storage backend (overrides config)
    #[arg(long, value_enum, env = "STORAGE_BACKEND")]
    storage: Option<StorageBackend>,

    /// Redis URL (overrides config)
    #[arg(long, env = "REDIS_URL")]
    redis_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, default_value = "false")]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    dotenvy::dotenv().ok();

    let args = Args::parse();

    init_logging(&args.log_level, args.json_logs)?;

    info!("Starting Shortpath v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load(&args.config, &args)?;
    info!(
        config = %args.config,
        backend = ?config.storage.backend,
        public_host = %config.public_host,
        "Configuration loaded"
    );

    let state = AppState::new(config.clone()).await?;
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    info!("Shortpath listening on {}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shortpath shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            // Keep serving; the process can still be killed
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    }
}

/// Initialize structured logging with tracing
fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .try_init()?;
    }

    Ok(())
}
