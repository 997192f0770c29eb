//! gmaking-growth - Character Growth Microservice
//!
//! Grows a game character by one evolution step: checks eligibility, rolls
//! stat increments, generates evolved artwork through Stable Horde and
//! writes the result atomically.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

use gmaking_growth::config::GrowthConfig;
use gmaking_growth::models::{modification, GrowthRules};
use gmaking_growth::services::{AssetFetcher, GrowthService, HordeClient};
use gmaking_growth::AppState;

/// Command-line arguments for gmaking-growth
#[derive(Parser, Debug)]
#[command(name = "gmaking-growth")]
#[command(about = "Character growth microservice for gmaking")]
#[command(version)]
struct Args {
    /// Path to growth.toml
    #[arg(short, long, env = "GMAKING_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on, e.g. 127.0.0.1:8000
    #[arg(short, long)]
    bind: Option<String>,

    /// SQLite database file
    #[arg(short, long)]
    database: Option<PathBuf>,
}

fn log_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "gmaking_growth={level},gmaking_common={level},tower_http={level}"
        ))
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    // Start at info so config loading is visible, then switch to the configured level
    let (filter, filter_handle) = reload::Layer::new(log_filter("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting gmaking-growth (Character Growth) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();

    let mut config =
        GrowthConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(path) = args.database {
        config.database.path = path;
    }

    filter_handle
        .reload(log_filter(&config.logging.level))
        .context("Failed to apply log level")?;

    modification::validate_catalog()
        .map_err(|e| anyhow::anyhow!("Invalid modification catalog: {}", e))?;
    let rules = GrowthRules::default();
    rules
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid growth rules: {}", e))?;

    info!("Database: {}", config.database.path.display());
    let db_pool = gmaking_growth::db::init_database_pool(&config.database.path)
        .await
        .context("Failed to open database")?;
    info!("Database connection established");

    let shutdown = CancellationToken::new();

    let horde = HordeClient::new(config.horde_settings(), shutdown.clone())
        .context("Failed to create Horde client")?;
    let poll = horde.settings().poll;
    info!(
        submit_url = %horde.settings().submit_url,
        model = %horde.settings().model,
        poll_interval_secs = poll.interval.as_secs(),
        max_wait_secs = poll.max_wait.as_secs(),
        "Generation client ready"
    );

    let assets = AssetFetcher::new(config.assets.base_origin.clone())
        .context("Failed to create asset fetcher")?;
    info!("Asset base origin: {}", assets.base_origin());

    let growth = Arc::new(GrowthService::new(
        db_pool.clone(),
        Arc::new(horde),
        assets,
        rules,
    ));

    let state = AppState::new(
        db_pool.clone(),
        growth,
        config.cors.allowed_origins.clone(),
        shutdown.clone(),
    );
    let app = gmaking_growth::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.server.bind))?;
    info!("Listening on http://{}", config.server.bind);
    info!("Health check: http://{}/health", config.server.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .context("Server error")?;

    db_pool.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM, then cancel in-flight generation waits
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install signal handler: {}", e);
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

    shutdown.cancel();
}
