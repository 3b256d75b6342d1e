#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use stockboard::api::router;
use stockboard::config::AppConfig;
use stockboard::db::SqliteDb;
use stockboard::error::{AppError, Result};
use stockboard::quotes::{
    HistoricalPoint, Interval, Quote, QuoteProvider, SearchResult, TrendingStock,
};
use stockboard::state::AppState;
use tempfile::TempDir;
use tower::ServiceExt;

/// Provider answering from fixed tables
#[derive(Default)]
pub struct StaticProvider {
    quotes: HashMap<String, Quote>,
    history: HashMap<(String, Interval), Vec<HistoricalPoint>>,
    trending: Vec<TrendingStock>,
    pub trending_down: AtomicBool,
}

impl StaticProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn quote(mut self, symbol: &str, price: f64) -> Self {
        self.quotes.insert(symbol.to_string(), quote(symbol, price));
        self
    }

    pub fn daily(mut self, symbol: &str, closes: &[f64]) -> Self {
        self.history
            .insert((symbol.to_string(), Interval::Daily), series(closes));
        self
    }

    pub fn trending(mut self, symbols: &[&str]) -> Self {
        self.trending = symbols
            .iter()
            .map(|s| TrendingStock {
                symbol: s.to_string(),
                price: 100.0,
                change: 1.0,
                change_percent: 1.0,
                volume: 10_000,
            })
            .collect();
        self
    }
}

#[async_trait]
impl QuoteProvider for StaticProvider {
    fn id(&self) -> &'static str {
        "static"
    }

    async fn get_quote(&self, symbol: &str) -> Result<Quote> {
        self.quotes
            .get(symbol)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("No quote for {}", symbol)))
    }

    async fn get_history(&self, symbol: &str, interval: Interval) -> Result<Vec<HistoricalPoint>> {
        self.history
            .get(&(symbol.to_string(), interval))
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("No {} history for {}", interval, symbol)))
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        let needle = query.to_ascii_uppercase();
        Ok(self
            .quotes
            .values()
            .filter(|q| q.symbol.contains(&needle))
            .map(|q| SearchResult {
                symbol: q.symbol.clone(),
                name: q.name.clone(),
                instrument_type: "Equity".to_string(),
                region: "United States".to_string(),
                currency: "USD".to_string(),
                match_score: Some(1.0),
            })
            .collect())
    }

    async fn get_trending(&self) -> Result<Vec<TrendingStock>> {
        if self.trending_down.load(Ordering::SeqCst) {
            return Err(AppError::Provider("service unavailable".to_string()));
        }
        Ok(self.trending.clone())
    }
}

pub fn quote(symbol: &str, price: f64) -> Quote {
    Quote {
        symbol: symbol.to_string(),
        name: format!("{} Corp", symbol),
        price,
        change: 0.0,
        change_percent: 0.0,
        volume: 1_000,
        high: price,
        low: price,
        open: price,
        previous_close: price,
        market_cap: None,
    }
}

pub fn series(closes: &[f64]) -> Vec<HistoricalPoint> {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| HistoricalPoint {
            date: start + chrono::Duration::days(i as i64),
            open: close,
            high: close,
            low: close,
            close,
            volume: 100,
        })
        .collect()
}

/// App state over an in-memory database
pub fn memory_state(provider: Arc<StaticProvider>) -> Arc<AppState> {
    let db = Arc::new(SqliteDb::open_in_memory().expect("in-memory db"));
    Arc::new(AppState::with_db(AppConfig::default(), db, provider))
}

/// Temp data directory with a config pointing into it
pub struct TestDir {
    _dir: TempDir, // keep alive for the life of the test
    pub path: PathBuf,
}

pub fn setup_dir() -> TestDir {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().to_path_buf();
    TestDir { _dir: dir, path }
}

pub fn file_config(data_dir: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.provider.api_key = "test".to_string();
    config.storage.data_dir = data_dir.to_path_buf();
    config
}

/// Send one request through the router and decode the JSON body
pub async fn call(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request");

    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, json)
}

pub fn app(state: Arc<AppState>) -> Router {
    router(state)
}
