// =============================================================================
// F&O Scanner — Main Entry Point
// =============================================================================
//
// Serves the futures & options analysis pipeline over HTTP.  Each scan is a
// pure batch recomputation over caller-supplied futures history and an option
// chain snapshot; the service keeps only the latest result.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod diagnostics;
mod futures_intel;
mod indicators;
mod options;
mod pipeline;
mod runtime_config;
mod signals;
mod strategy;
mod types;

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::runtime_config::RuntimeConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("F&O scanner starting up");

    let config_path =
        std::env::var("FNO_CONFIG_PATH").unwrap_or_else(|_| "runtime_config.json".into());

    let config = RuntimeConfig::load(&config_path).unwrap_or_else(|e| {
        warn!(error = %e, path = %config_path, "Failed to load config, using defaults");
        RuntimeConfig::default()
    });

    info!(
        lot_sizes = config.lot_sizes.len(),
        spread_offset = config.strategy_params.spread_offset,
        premium_policy = ?config.strategy_params.premium_policy,
        "Runtime config ready"
    );

    if config.lot_sizes.is_empty() {
        warn!("Lot size table is empty; every recommendation will be unsized");
    }

    if std::env::var(api::auth::ADMIN_TOKEN_ENV).unwrap_or_default().is_empty() {
        warn!(
            "{} is not set; only /api/v1/health will be reachable",
            api::auth::ADMIN_TOKEN_ENV
        );
    }

    // ── 2. Build shared state ────────────────────────────────────────────
    let state = Arc::new(AppState::new(config));

    // ── 3. Start the API server ──────────────────────────────────────────
    let bind_addr = std::env::var("FNO_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3001".into());

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind API server on {bind_addr}"))?;
    info!(addr = %bind_addr, "API server listening");

    let app = api::rest::router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("API server failed")?;

    // ── 4. Graceful shutdown ─────────────────────────────────────────────
    // The config file is maintained externally and never written back.
    info!("F&O scanner shut down complete.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl+C");
        return;
    }
    warn!("Shutdown signal received, stopping gracefully");
}
