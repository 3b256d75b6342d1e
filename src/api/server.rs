//! HTTP server for the dashboard REST API
//!
//! All routes live under `/api/v1`. The presentation layer reads store
//! state and issues intents through them.

use crate::api::handlers;
use crate::config::ServerConfig;
use crate::error::{AppError, Result};
use crate::state::AppState;
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Build the API router with all routes
pub fn router(state: Arc<AppState>) -> Router {
    // Allow all origins for the local dashboard UI
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        // ================================================================
        // Stocks and market data
        // ================================================================
        .route("/health", get(handlers::health_check))
        .route("/stocks/status", get(handlers::stocks_status))
        .route("/stocks/trending", get(handlers::trending))
        .route("/stocks/refresh", post(handlers::refresh_stocks))
        .route("/stocks/retry", post(handlers::retry_stocks))
        .route("/quote/:symbol", get(handlers::get_quote))
        .route("/history/:symbol", get(handlers::get_history))
        .route("/intervals", get(handlers::get_intervals))
        .route("/search", get(handlers::search))

        // ================================================================
        // Watchlist
        // ================================================================
        .route(
            "/watchlist",
            get(handlers::get_watchlist).post(handlers::add_to_watchlist),
        )
        .route("/watchlist/:symbol", delete(handlers::remove_from_watchlist))

        // ================================================================
        // Price alerts
        // ================================================================
        .route(
            "/alerts",
            get(handlers::list_alerts).post(handlers::create_alert),
        )
        .route("/alerts/stocks", get(handlers::alerted_stocks))
        .route(
            "/alerts/triggered",
            get(handlers::triggered_alerts).delete(handlers::clear_triggered_alerts),
        )
        .route("/alerts/:id", delete(handlers::delete_alert))

        // ================================================================
        // Portfolios
        // ================================================================
        .route(
            "/portfolios",
            get(handlers::list_portfolios).post(handlers::create_portfolio),
        )
        .route("/portfolios/active", put(handlers::set_active_portfolio))
        .route("/portfolios/:id", delete(handlers::delete_portfolio))
        .route("/portfolios/:id/symbols", post(handlers::add_to_portfolio))
        .route(
            "/portfolios/:id/symbols/:symbol",
            delete(handlers::remove_from_portfolio),
        )
        .route("/portfolios/:id/stocks", get(handlers::portfolio_stocks))

        // ================================================================
        // Widgets
        // ================================================================
        .route(
            "/widgets",
            get(handlers::list_widgets)
                .post(handlers::add_widget)
                .delete(handlers::clear_widgets),
        )
        .route("/widgets/reorder", post(handlers::reorder_widgets))
        .route("/widgets/:id", delete(handlers::remove_widget))
        .route("/widgets/:id/refresh", post(handlers::refresh_widget))
        .route("/widgets/:id/table", get(handlers::widget_table))

        // ================================================================
        // Chart comparison
        // ================================================================
        .route("/compare", post(handlers::create_comparison))
        .route(
            "/compare/:id",
            get(handlers::get_comparison).delete(handlers::delete_comparison),
        )
        .route("/compare/:id/symbols", post(handlers::add_compared_symbol))
        .route(
            "/compare/:id/symbols/:symbol",
            delete(handlers::remove_compared_symbol),
        )
        .route("/compare/:id/timeframe", put(handlers::set_comparison_timeframe))
        .route("/compare/:id/normalize", put(handlers::set_comparison_normalize));

    Router::new()
        .nest("/api/v1", api)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// API server manager
pub struct ApiServer {
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ApiServer {
    /// Create a stopped server
    pub fn new() -> Self {
        Self {
            shutdown_tx: None,
            handle: None,
        }
    }

    /// Bind and start serving. Returns the bound address.
    pub async fn start(
        &mut self,
        state: Arc<AppState>,
        config: &ServerConfig,
    ) -> Result<SocketAddr> {
        let addr: SocketAddr = config
            .bind_addr()
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid address: {}", e)))?;

        let listener = tokio::net::TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;

        let app = router(state);

        // Create shutdown channel
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        self.shutdown_tx = Some(shutdown_tx);

        info!("Starting StockBoard API server on {}", local_addr);

        self.handle = Some(tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                info!("API server shutting down");
            });

            if let Err(e) = server.await {
                error!("API server error: {}", e);
            }
        }));

        info!("");
        info!("=== Endpoints ===");
        info!("  GET  http://{}/api/v1/health", local_addr);
        info!("  GET  http://{}/api/v1/watchlist", local_addr);
        info!("  GET  http://{}/api/v1/widgets", local_addr);
        info!("  POST http://{}/api/v1/compare", local_addr);

        Ok(local_addr)
    }

    /// Signal shutdown and wait for in-flight requests to finish
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            info!("API server stop signal sent");
        }
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                error!("API server task failed: {}", e);
            }
        }
    }

    /// Check if server is running
    pub fn is_running(&self) -> bool {
        self.shutdown_tx.is_some()
    }
}

impl Default for ApiServer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ApiServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
