//! Scripted provider for unit tests

use crate::error::{AppError, Result};
use crate::quotes::types::*;
use crate::quotes::QuoteProvider;
use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Outcome of one scripted call
#[derive(Clone)]
pub enum Scripted<T> {
    Ok(T),
    NotFound,
    Fail,
}

impl<T> Scripted<T> {
    fn into_result(self, what: &str) -> Result<T> {
        match self {
            Scripted::Ok(v) => Ok(v),
            Scripted::NotFound => Err(AppError::NotFound(what.to_string())),
            Scripted::Fail => Err(AppError::Provider(format!("scripted failure: {}", what))),
        }
    }
}

/// Provider whose answers are queued per symbol. When a queue runs dry the
/// last configured default is used; unknown symbols are `NotFound`.
#[derive(Default)]
pub struct MockProvider {
    quotes: Mutex<HashMap<String, VecDeque<Scripted<Quote>>>>,
    quote_defaults: Mutex<HashMap<String, Scripted<Quote>>>,
    history: Mutex<HashMap<(String, Interval), Scripted<Vec<HistoricalPoint>>>>,
    trending: Mutex<Option<Scripted<Vec<TrendingStock>>>>,
    pub quote_calls: AtomicUsize,
    pub trending_calls: AtomicUsize,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quote(self, symbol: &str, price: f64) -> Self {
        self.set_quote(symbol, Scripted::Ok(quote(symbol, price)));
        self
    }

    pub fn set_quote(&self, symbol: &str, outcome: Scripted<Quote>) {
        self.quote_defaults.lock().insert(symbol.to_string(), outcome);
    }

    pub fn queue_quote(&self, symbol: &str, outcome: Scripted<Quote>) {
        self.quotes
            .lock()
            .entry(symbol.to_string())
            .or_default()
            .push_back(outcome);
    }

    pub fn set_history(
        &self,
        symbol: &str,
        interval: Interval,
        outcome: Scripted<Vec<HistoricalPoint>>,
    ) {
        self.history.lock().insert((symbol.to_string(), interval), outcome);
    }

    pub fn set_trending(&self, outcome: Scripted<Vec<TrendingStock>>) {
        *self.trending.lock() = Some(outcome);
    }
}

#[async_trait]
impl QuoteProvider for MockProvider {
    fn id(&self) -> &'static str {
        "mock"
    }

    async fn get_quote(&self, symbol: &str) -> Result<Quote> {
        self.quote_calls.fetch_add(1, Ordering::SeqCst);
        let queued = self.quotes.lock().get_mut(symbol).and_then(VecDeque::pop_front);
        let outcome = queued
            .or_else(|| self.quote_defaults.lock().get(symbol).cloned())
            .unwrap_or(Scripted::NotFound);
        outcome.into_result(symbol)
    }

    async fn get_history(&self, symbol: &str, interval: Interval) -> Result<Vec<HistoricalPoint>> {
        self.history
            .lock()
            .get(&(symbol.to_string(), interval))
            .cloned()
            .unwrap_or(Scripted::NotFound)
            .into_result(symbol)
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        let needle = query.to_ascii_uppercase();
        Ok(self
            .quote_defaults
            .lock()
            .keys()
            .filter(|s| s.contains(&needle))
            .map(|s| SearchResult {
                symbol: s.clone(),
                name: s.clone(),
                instrument_type: "Equity".to_string(),
                region: "United States".to_string(),
                currency: "USD".to_string(),
                match_score: Some(1.0),
            })
            .collect())
    }

    async fn get_trending(&self) -> Result<Vec<TrendingStock>> {
        self.trending_calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self
            .trending
            .lock()
            .clone()
            .unwrap_or(Scripted::Ok(Vec::new()));
        outcome.into_result("trending")
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

pub fn trending(symbols: &[&str]) -> Vec<TrendingStock> {
    symbols
        .iter()
        .map(|s| TrendingStock {
            symbol: s.to_string(),
            price: 100.0,
            change: 1.0,
            change_percent: 1.0,
            volume: 10_000,
        })
        .collect()
}

/// Daily series starting 2024-01-01 with the given closes
pub fn series(closes: &[f64]) -> Vec<HistoricalPoint> {
    series_from(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), closes)
}

pub fn series_from(start: NaiveDate, closes: &[f64]) -> Vec<HistoricalPoint> {
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
