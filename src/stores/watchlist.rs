//! Watchlist/Alert store
//!
//! Owns the watchlist, cached quotes, trending snapshot, portfolios and price
//! alerts. Synchronous mutations go through [`WatchlistState::reduce`]; the
//! store applies them under its lock and writes the persisted subset after
//! every change.
//!
//! The refresh loop is a circuit: after `failure_threshold` consecutive
//! failed refreshes the poller is stopped and `api_error` is raised. Nothing
//! restarts it except [`WatchlistStore::reset_and_retry_stocks`].

use crate::config::PollingConfig;
use crate::db::sqlite::{SqliteDb, STOCK_STORE_KEY};
use crate::error::{AppError, Result};
use crate::quotes::{fetch_quotes, Quote, QuoteProvider, TrendingStock};
use crate::scheduler::Poller;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Named group of symbols
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Portfolio {
    pub id: String,
    pub name: String,
    pub stocks: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Price alert on a symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceAlert {
    pub id: String,
    pub symbol: String,
    pub target_price: f64,
    pub is_above: bool,
    pub created_at: DateTime<Utc>,
    pub triggered: bool,
}

impl PriceAlert {
    fn is_met_by(&self, price: f64) -> bool {
        if self.is_above {
            price >= self.target_price
        } else {
            price <= self.target_price
        }
    }
}

/// Persisted subset of the store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedWatchlist {
    #[serde(default)]
    pub watchlist: Vec<String>,
    #[serde(default)]
    pub portfolios: Vec<Portfolio>,
    #[serde(default)]
    pub price_alerts: Vec<PriceAlert>,
}

/// Full in-memory state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WatchlistState {
    pub trending_stocks: Vec<TrendingStock>,
    /// Bumped only when the trending content actually changes
    pub trending_revision: u64,
    pub watchlist: Vec<String>,
    pub watchlist_stocks: Vec<Quote>,
    pub portfolios: Vec<Portfolio>,
    pub active_portfolio: Option<String>,
    pub price_alerts: Vec<PriceAlert>,
    pub triggered_alerts: Vec<PriceAlert>,
    pub is_loading: bool,
    pub api_error: bool,
    pub failure_count: u32,
}

/// State transitions
#[derive(Debug, Clone)]
pub enum WatchlistAction {
    AddSymbol(String),
    RemoveSymbol(String),
    CreatePortfolio(Portfolio),
    DeletePortfolio(String),
    AddToPortfolio { id: String, symbol: String },
    RemoveFromPortfolio { id: String, symbol: String },
    SetActivePortfolio(Option<String>),
    CreateAlert(PriceAlert),
    DeleteAlert(String),
    ClearTriggeredAlerts,
    RefreshStarted,
    TrendingLoaded(Vec<TrendingStock>),
    RefreshFailed,
    WatchlistLoaded(Vec<Quote>),
    RefreshFinished { failure_threshold: u32 },
    ResetFailures,
}

impl WatchlistAction {
    /// Whether the action can change the persisted subset
    fn touches_persisted(&self) -> bool {
        !matches!(
            self,
            WatchlistAction::SetActivePortfolio(_)
                | WatchlistAction::ClearTriggeredAlerts
                | WatchlistAction::RefreshStarted
                | WatchlistAction::TrendingLoaded(_)
                | WatchlistAction::RefreshFailed
                | WatchlistAction::RefreshFinished { .. }
                | WatchlistAction::ResetFailures
        )
    }
}

impl WatchlistState {
    /// Rebuild state from the persisted subset
    pub fn from_persisted(persisted: PersistedWatchlist) -> Self {
        Self {
            watchlist: persisted.watchlist,
            portfolios: persisted.portfolios,
            price_alerts: persisted.price_alerts,
            ..Self::default()
        }
    }

    pub fn persisted(&self) -> PersistedWatchlist {
        PersistedWatchlist {
            watchlist: self.watchlist.clone(),
            portfolios: self.portfolios.clone(),
            price_alerts: self.price_alerts.clone(),
        }
    }

    pub fn is_in_watchlist(&self, symbol: &str) -> bool {
        self.watchlist.iter().any(|s| s == symbol)
    }

    pub fn portfolio(&self, id: &str) -> Option<&Portfolio> {
        self.portfolios.iter().find(|p| p.id == id)
    }

    /// Apply an action, returning the next state
    pub fn reduce(mut self, action: WatchlistAction) -> Self {
        match action {
            WatchlistAction::AddSymbol(symbol) => {
                if !self.is_in_watchlist(&symbol) {
                    self.watchlist.push(symbol);
                }
            }
            WatchlistAction::RemoveSymbol(symbol) => {
                self.watchlist.retain(|s| *s != symbol);
            }
            WatchlistAction::CreatePortfolio(portfolio) => {
                self.portfolios.push(portfolio);
            }
            WatchlistAction::DeletePortfolio(id) => {
                self.portfolios.retain(|p| p.id != id);
                if self.active_portfolio.as_deref() == Some(id.as_str()) {
                    self.active_portfolio = None;
                }
            }
            WatchlistAction::AddToPortfolio { id, symbol } => {
                if let Some(p) = self.portfolios.iter_mut().find(|p| p.id == id) {
                    if !p.stocks.contains(&symbol) {
                        p.stocks.push(symbol);
                    }
                }
            }
            WatchlistAction::RemoveFromPortfolio { id, symbol } => {
                if let Some(p) = self.portfolios.iter_mut().find(|p| p.id == id) {
                    p.stocks.retain(|s| *s != symbol);
                }
            }
            WatchlistAction::SetActivePortfolio(id) => {
                self.active_portfolio = id;
            }
            WatchlistAction::CreateAlert(alert) => {
                self = self.reduce(WatchlistAction::AddSymbol(alert.symbol.clone()));
                self.price_alerts.push(alert);
            }
            WatchlistAction::DeleteAlert(id) => {
                self.price_alerts.retain(|a| a.id != id);
            }
            WatchlistAction::ClearTriggeredAlerts => {
                self.triggered_alerts.clear();
            }
            WatchlistAction::RefreshStarted => {
                self.is_loading = true;
            }
            WatchlistAction::TrendingLoaded(trending) => {
                if self.trending_stocks != trending {
                    self.trending_stocks = trending;
                    self.trending_revision += 1;
                }
                self.failure_count = 0;
                self.api_error = false;
            }
            WatchlistAction::RefreshFailed => {
                self.failure_count += 1;
            }
            WatchlistAction::WatchlistLoaded(quotes) => {
                for alert in self.price_alerts.iter_mut().filter(|a| !a.triggered) {
                    let hit = quotes
                        .iter()
                        .find(|q| q.symbol == alert.symbol)
                        .is_some_and(|q| alert.is_met_by(q.price));
                    if hit {
                        alert.triggered = true;
                        self.triggered_alerts.push(alert.clone());
                    }
                }
                self.watchlist_stocks = quotes;
            }
            WatchlistAction::RefreshFinished { failure_threshold } => {
                self.is_loading = false;
                if self.failure_count >= failure_threshold {
                    self.api_error = true;
                }
            }
            WatchlistAction::ResetFailures => {
                self.failure_count = 0;
                self.api_error = false;
            }
        }
        self
    }
}

/// Refresh loop status
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStatus {
    pub failure_count: u32,
    pub api_error: bool,
    pub is_loading: bool,
    pub polling: bool,
    pub trending_revision: u64,
}

/// Watchlist/Alert store
pub struct WatchlistStore {
    provider: Arc<dyn QuoteProvider>,
    db: Arc<SqliteDb>,
    state: RwLock<WatchlistState>,
    poller: Poller,
    interval: Duration,
    failure_threshold: u32,
}

impl WatchlistStore {
    /// Create the store, rehydrating the persisted subset
    pub fn new(
        provider: Arc<dyn QuoteProvider>,
        db: Arc<SqliteDb>,
        polling: &PollingConfig,
    ) -> Arc<Self> {
        let persisted = match db.load::<PersistedWatchlist>(STOCK_STORE_KEY) {
            Ok(Some(p)) => p,
            Ok(None) => PersistedWatchlist::default(),
            Err(e) => {
                warn!("Discarding unreadable {} record: {}", STOCK_STORE_KEY, e);
                PersistedWatchlist::default()
            }
        };

        info!(
            "Watchlist store loaded: {} symbols, {} portfolios, {} alerts",
            persisted.watchlist.len(),
            persisted.portfolios.len(),
            persisted.price_alerts.len()
        );

        Arc::new(Self {
            provider,
            db,
            state: RwLock::new(WatchlistState::from_persisted(persisted)),
            poller: Poller::new("watchlist"),
            interval: polling.watchlist_interval(),
            failure_threshold: polling.failure_threshold,
        })
    }

    fn dispatch(&self, action: WatchlistAction) {
        let persist = action.touches_persisted();
        let snapshot = {
            let mut state = self.state.write();
            *state = std::mem::take(&mut *state).reduce(action);
            persist.then(|| state.persisted())
        };

        if let Some(snapshot) = snapshot {
            if let Err(e) = self.db.save(STOCK_STORE_KEY, &snapshot) {
                error!("Failed to persist {}: {}", STOCK_STORE_KEY, e);
            }
        }
    }

    /// Clone of the full state
    pub fn snapshot(&self) -> WatchlistState {
        self.state.read().clone()
    }

    pub fn status(&self) -> StoreStatus {
        let state = self.state.read();
        StoreStatus {
            failure_count: state.failure_count,
            api_error: state.api_error,
            is_loading: state.is_loading,
            polling: self.poller.is_running(),
            trending_revision: state.trending_revision,
        }
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_running()
    }

    // ========== Refresh ==========

    /// Refresh trending stocks and watchlist quotes once
    pub async fn refresh_stocks(&self) {
        let watchlist = self.state.read().watchlist.clone();
        self.dispatch(WatchlistAction::RefreshStarted);

        let trending_ok = match self.provider.get_trending().await {
            Ok(trending) if !trending.is_empty() => {
                self.dispatch(WatchlistAction::TrendingLoaded(trending));
                true
            }
            Ok(_) => {
                warn!("Trending response was empty");
                self.dispatch(WatchlistAction::RefreshFailed);
                true
            }
            Err(e) => {
                warn!("Failed to fetch trending stocks: {}", e);
                self.dispatch(WatchlistAction::RefreshFailed);
                false
            }
        };

        if trending_ok && !watchlist.is_empty() {
            let quotes = fetch_quotes(self.provider.as_ref(), &watchlist).await;
            debug!("Refreshed {}/{} watchlist quotes", quotes.len(), watchlist.len());
            self.dispatch(WatchlistAction::WatchlistLoaded(quotes));
        }

        self.dispatch(WatchlistAction::RefreshFinished {
            failure_threshold: self.failure_threshold,
        });

        let (failures, api_error) = {
            let state = self.state.read();
            (state.failure_count, state.api_error)
        };
        if api_error && self.poller.stop() {
            error!(
                "Stopped stock polling after {} consecutive failures",
                failures
            );
        }
    }

    /// Start the refresh loop. A second call while running is a no-op.
    pub fn start_polling(self: &Arc<Self>) -> bool {
        let store = Arc::downgrade(self);
        self.poller.start(self.interval, move || {
            let store = store.clone();
            async move {
                if let Some(store) = store.upgrade() {
                    store.refresh_stocks().await;
                }
            }
        })
    }

    pub fn stop_polling(&self) -> bool {
        self.poller.stop()
    }

    /// Clear the failure circuit, refresh now and restart polling if stopped
    pub async fn reset_and_retry_stocks(self: &Arc<Self>) {
        info!("Resetting stock refresh failures");
        self.dispatch(WatchlistAction::ResetFailures);
        self.refresh_stocks().await;

        if !self.poller.is_running() {
            self.start_polling();
        }
    }

    // ========== Watchlist ==========

    pub fn add_to_watchlist(&self, symbol: &str) {
        self.dispatch(WatchlistAction::AddSymbol(symbol.to_string()));
    }

    pub fn remove_from_watchlist(&self, symbol: &str) {
        self.dispatch(WatchlistAction::RemoveSymbol(symbol.to_string()));
    }

    pub fn is_in_watchlist(&self, symbol: &str) -> bool {
        self.state.read().is_in_watchlist(symbol)
    }

    // ========== Portfolios ==========

    pub fn create_portfolio(&self, name: &str) -> Portfolio {
        let portfolio = Portfolio {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            stocks: Vec::new(),
            created_at: Utc::now(),
        };
        self.dispatch(WatchlistAction::CreatePortfolio(portfolio.clone()));
        portfolio
    }

    /// Returns `false` if no portfolio had that id
    pub fn delete_portfolio(&self, id: &str) -> bool {
        if self.state.read().portfolio(id).is_none() {
            return false;
        }
        self.dispatch(WatchlistAction::DeletePortfolio(id.to_string()));
        true
    }

    pub fn add_to_portfolio(&self, id: &str, symbol: &str) -> Result<()> {
        self.ensure_portfolio(id)?;
        self.dispatch(WatchlistAction::AddToPortfolio {
            id: id.to_string(),
            symbol: symbol.to_string(),
        });
        Ok(())
    }

    pub fn remove_from_portfolio(&self, id: &str, symbol: &str) -> Result<()> {
        self.ensure_portfolio(id)?;
        self.dispatch(WatchlistAction::RemoveFromPortfolio {
            id: id.to_string(),
            symbol: symbol.to_string(),
        });
        Ok(())
    }

    pub fn set_active_portfolio(&self, id: Option<&str>) -> Result<()> {
        if let Some(id) = id {
            self.ensure_portfolio(id)?;
        }
        self.dispatch(WatchlistAction::SetActivePortfolio(id.map(str::to_string)));
        Ok(())
    }

    /// Quotes for a portfolio's symbols; failed symbols are left out
    pub async fn get_portfolio_stocks(&self, id: &str) -> Result<Vec<Quote>> {
        let symbols = self
            .state
            .read()
            .portfolio(id)
            .map(|p| p.stocks.clone())
            .ok_or_else(|| AppError::NotFound(format!("Portfolio not found: {}", id)))?;

        Ok(fetch_quotes(self.provider.as_ref(), &symbols).await)
    }

    fn ensure_portfolio(&self, id: &str) -> Result<()> {
        match self.state.read().portfolio(id) {
            Some(_) => Ok(()),
            None => Err(AppError::NotFound(format!("Portfolio not found: {}", id))),
        }
    }

    // ========== Price Alerts ==========

    /// Create an alert, adding its symbol to the watchlist if needed
    pub fn create_price_alert(
        &self,
        symbol: &str,
        target_price: f64,
        is_above: bool,
    ) -> PriceAlert {
        let alert = PriceAlert {
            id: Uuid::new_v4().to_string(),
            symbol: symbol.to_string(),
            target_price,
            is_above,
            created_at: Utc::now(),
            triggered: false,
        };
        self.dispatch(WatchlistAction::CreateAlert(alert.clone()));
        alert
    }

    /// Returns `false` if no alert had that id
    pub fn delete_price_alert(&self, id: &str) -> bool {
        if !self.state.read().price_alerts.iter().any(|a| a.id == id) {
            return false;
        }
        self.dispatch(WatchlistAction::DeleteAlert(id.to_string()));
        true
    }

    /// Current quotes for every alerted symbol, deduplicated.
    /// Symbols whose fetch fails are silently left out.
    pub async fn get_alerted_stocks(&self) -> Vec<Quote> {
        let symbols: Vec<String> = {
            let state = self.state.read();
            let mut seen = HashSet::new();
            state
                .price_alerts
                .iter()
                .filter(|a| seen.insert(a.symbol.as_str()))
                .map(|a| a.symbol.clone())
                .collect()
        };

        if symbols.is_empty() {
            return Vec::new();
        }

        fetch_quotes(self.provider.as_ref(), &symbols).await
    }

    pub fn clear_triggered_alerts(&self) {
        self.dispatch(WatchlistAction::ClearTriggeredAlerts);
    }
}
