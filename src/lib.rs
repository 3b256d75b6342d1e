//! StockBoard - stock dashboard backend
//!
//! Watchlists with price alerts and portfolios, quote-backed dashboard
//! widgets and normalized chart comparisons, served to the dashboard UI
//! over a local REST API.

pub mod api;
pub mod compare;
pub mod config;
pub mod db;
pub mod error;
pub mod quotes;
pub mod scheduler;
pub mod services;
pub mod state;
pub mod stores;

use anyhow::Context;
use api::ApiServer;
use config::{AppConfig, LogConfig};
use quotes::{AlphaVantageClient, QuoteProvider};
use state::AppState;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging. `RUST_LOG` wins over the configured filter.
pub fn init_tracing(log: &LogConfig) {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log.filter.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Run the dashboard backend until Ctrl-C
pub async fn run() -> anyhow::Result<()> {
    let config = AppConfig::load().context("Failed to load configuration")?;
    init_tracing(&config.log);

    tracing::info!("Starting StockBoard...");
    match AppConfig::find_file() {
        Some(path) => tracing::info!("Configuration file: {}", path.display()),
        None => tracing::info!("Using default configuration"),
    }
    config.validate().context("Invalid configuration")?;

    let provider: Arc<dyn QuoteProvider> = Arc::new(
        AlphaVantageClient::new(&config.provider).context("Failed to create quote provider")?,
    );
    let state = Arc::new(AppState::new(config, provider).context("Failed to open database")?);
    tracing::info!("Application state initialized");

    state.watchlist.refresh_stocks().await;
    state.start_polling();

    let mut server = ApiServer::new();
    server
        .start(state.clone(), &state.config.server)
        .await
        .context("Failed to start API server")?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    tracing::info!("Shutdown requested");

    state.stop_polling();
    server.stop().await;

    tracing::info!("StockBoard stopped");
    Ok(())
}
