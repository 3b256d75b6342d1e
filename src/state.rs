//! Application state management

use crate::compare::ComparisonEngine;
use crate::config::AppConfig;
use crate::db::sqlite::SqliteDb;
use crate::error::Result;
use crate::quotes::QuoteProvider;
use crate::stores::{WatchlistStore, WidgetStore};
use std::sync::Arc;

/// Application state shared across all handlers
pub struct AppState {
    /// Effective configuration
    pub config: AppConfig,

    /// SQLite database holding the persisted store records
    pub sqlite: Arc<SqliteDb>,

    /// Finance data provider
    pub provider: Arc<dyn QuoteProvider>,

    /// Watchlist, portfolios and price alerts
    pub watchlist: Arc<WatchlistStore>,

    /// Dashboard widgets
    pub widgets: Arc<WidgetStore>,

    /// Chart comparison sessions
    pub compare: Arc<ComparisonEngine>,
}

impl AppState {
    /// Create new application state, opening the configured database
    pub fn new(config: AppConfig, provider: Arc<dyn QuoteProvider>) -> Result<Self> {
        let db_path = config.db_path();
        tracing::info!("Database: {:?}", db_path);

        let sqlite = Arc::new(SqliteDb::new(&db_path)?);
        Ok(Self::with_db(config, sqlite, provider))
    }

    /// Create state over an already opened database
    pub fn with_db(
        config: AppConfig,
        sqlite: Arc<SqliteDb>,
        provider: Arc<dyn QuoteProvider>,
    ) -> Self {
        let watchlist = WatchlistStore::new(provider.clone(), sqlite.clone(), &config.polling);
        let widgets = WidgetStore::new(provider.clone(), sqlite.clone(), &config.polling);
        let compare = Arc::new(ComparisonEngine::new(
            provider.clone(),
            config.compare.max_sessions,
        ));

        tracing::info!("Quote provider: {}", provider.id());

        Self {
            config,
            sqlite,
            provider,
            watchlist,
            widgets,
            compare,
        }
    }

    /// Start both background refresh loops
    pub fn start_polling(&self) {
        self.watchlist.start_polling();
        self.widgets.start_refresh_polling();
    }

    /// Stop both background refresh loops
    pub fn stop_polling(&self) {
        self.watchlist.stop_polling();
        self.widgets.stop_refresh_polling();
    }
}
