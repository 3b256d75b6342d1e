//! Comparison session state

use crate::compare::series::{compute_series, Alignment, ComparisonPoint};
use crate::error::Result;
use crate::quotes::{HistoricalPoint, Interval, Quote, QuoteProvider};
use futures_util::future::join_all;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Symbols under comparison together with their historical series
#[derive(Debug, Clone)]
pub struct ComparisonSession {
    pub symbols: Vec<Quote>,
    pub history: HashMap<String, Vec<HistoricalPoint>>,
    pub timeframe: Interval,
    pub normalize: bool,
}

impl Default for ComparisonSession {
    fn default() -> Self {
        Self {
            symbols: Vec::new(),
            history: HashMap::new(),
            timeframe: Interval::Daily,
            normalize: true,
        }
    }
}

impl ComparisonSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.symbols.iter().any(|q| q.symbol == symbol)
    }

    /// Compared symbols in display order
    pub fn symbol_names(&self) -> Vec<String> {
        self.symbols.iter().map(|q| q.symbol.clone()).collect()
    }

    /// Add a symbol to the comparison.
    ///
    /// Returns `Ok(false)` if it was already compared. A failed quote fetch
    /// leaves the session untouched; a failed history fetch still adds the
    /// symbol, without a series.
    pub async fn add_symbol(&mut self, provider: &dyn QuoteProvider, symbol: &str) -> Result<bool> {
        if self.contains(symbol) {
            return Ok(false);
        }

        let quote = provider.get_quote(symbol).await?;
        self.symbols.push(quote);

        match provider.get_history(symbol, self.timeframe).await {
            Ok(series) => {
                self.history.insert(symbol.to_string(), series);
            }
            Err(e) => warn!("No {} history for {}: {}", self.timeframe, symbol, e),
        }
        Ok(true)
    }

    /// Returns `false` if the symbol was not compared
    pub fn remove_symbol(&mut self, symbol: &str) -> bool {
        let before = self.symbols.len();
        self.symbols.retain(|q| q.symbol != symbol);
        self.history.remove(symbol);
        self.symbols.len() != before
    }

    /// Switch timeframe and refetch every series.
    /// A symbol whose refetch fails loses its old series.
    pub async fn set_timeframe(&mut self, provider: &dyn QuoteProvider, timeframe: Interval) {
        self.timeframe = timeframe;
        let symbols = self.symbol_names();

        let results = join_all(symbols.iter().map(|s| provider.get_history(s, timeframe))).await;

        for (symbol, result) in symbols.into_iter().zip(results) {
            match result {
                Ok(series) => {
                    self.history.insert(symbol, series);
                }
                Err(e) => {
                    warn!("Dropping {} series for {}: {}", timeframe, symbol, e);
                    self.history.remove(&symbol);
                }
            }
        }
        debug!("Comparison switched to {} ({} series)", timeframe, self.history.len());
    }

    pub fn set_normalize(&mut self, normalize: bool) {
        self.normalize = normalize;
    }

    /// Chart series for the current symbols
    pub fn compute_series(&self, normalize: bool, alignment: Alignment) -> Vec<ComparisonPoint> {
        compute_series(&self.symbol_names(), &self.history, normalize, alignment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quotes::mock::{quote, series, MockProvider, Scripted};

    #[tokio::test]
    async fn test_add_is_idempotent() {
        let provider = MockProvider::new().with_quote("AAPL", 190.0);
        provider.set_history("AAPL", Interval::Daily, Scripted::Ok(series(&[1.0, 2.0])));
        let mut session = ComparisonSession::new();

        assert!(session.add_symbol(&provider, "AAPL").await.unwrap());
        assert!(!session.add_symbol(&provider, "AAPL").await.unwrap());
        assert_eq!(session.symbols, vec![quote("AAPL", 190.0)]);
        assert_eq!(session.history["AAPL"].len(), 2);
    }

    #[tokio::test]
    async fn test_quote_failure_does_not_add() {
        let provider = MockProvider::new();
        provider.set_quote("AAPL", Scripted::Fail);
        let mut session = ComparisonSession::new();

        assert!(session.add_symbol(&provider, "AAPL").await.is_err());
        assert!(session.symbols.is_empty());
        assert!(session.history.is_empty());
    }

    #[tokio::test]
    async fn test_history_failure_still_adds_symbol() {
        let provider = MockProvider::new().with_quote("AAPL", 190.0);
        let mut session = ComparisonSession::new();

        assert!(session.add_symbol(&provider, "AAPL").await.unwrap());
        assert!(session.contains("AAPL"));
        assert!(!session.history.contains_key("AAPL"));
    }

    #[tokio::test]
    async fn test_remove_clears_list_and_series() {
        let provider = MockProvider::new().with_quote("AAPL", 190.0);
        provider.set_history("AAPL", Interval::Daily, Scripted::Ok(series(&[1.0])));
        let mut session = ComparisonSession::new();
        session.add_symbol(&provider, "AAPL").await.unwrap();

        assert!(session.remove_symbol("AAPL"));
        assert!(session.symbols.is_empty());
        assert!(session.history.is_empty());
        assert!(!session.remove_symbol("AAPL"));
    }

    #[tokio::test]
    async fn test_set_timeframe_refetches_and_drops_stale() {
        let provider = MockProvider::new().with_quote("A", 1.0).with_quote("B", 2.0);
        provider.set_history("A", Interval::Daily, Scripted::Ok(series(&[1.0])));
        provider.set_history("B", Interval::Daily, Scripted::Ok(series(&[2.0])));
        provider.set_history("A", Interval::Weekly, Scripted::Ok(series(&[5.0, 6.0])));
        let mut session = ComparisonSession::new();
        session.add_symbol(&provider, "A").await.unwrap();
        session.add_symbol(&provider, "B").await.unwrap();

        session.set_timeframe(&provider, Interval::Weekly).await;

        assert_eq!(session.timeframe, Interval::Weekly);
        assert_eq!(session.history["A"].len(), 2);
        assert!(!session.history.contains_key("B"));
        assert_eq!(session.symbols.len(), 2);
    }
}
