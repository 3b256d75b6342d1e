//! Quote client module
//!
//! `QuoteProvider` is the seam between the stores and the finance data API.
//! Every call returns an explicit `Result`: an unknown symbol surfaces as
//! `AppError::NotFound`, network and upstream failures as `Http`, `Provider`
//! or `RateLimited`.

pub mod types;
pub mod alpha_vantage;
mod rate_limiter;

#[cfg(test)]
pub(crate) mod mock;

use crate::error::Result;
use async_trait::async_trait;
use futures_util::future::join_all;
use tracing::{debug, warn};
pub use alpha_vantage::AlphaVantageClient;
pub use types::{HistoricalPoint, Interval, Quote, SearchResult, TrendingStock};

/// Finance data provider
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Provider ID (e.g., "alphavantage")
    fn id(&self) -> &'static str;

    /// Get the latest quote for a symbol
    async fn get_quote(&self, symbol: &str) -> Result<Quote>;

    /// Get a historical series, ascending by date
    async fn get_history(&self, symbol: &str, interval: Interval) -> Result<Vec<HistoricalPoint>>;

    /// Search symbols by keywords
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>>;

    /// Get the trending stocks snapshot
    async fn get_trending(&self) -> Result<Vec<TrendingStock>>;
}

/// Fetch one quote per symbol concurrently, dropping failures.
///
/// Output order follows `symbols`. A symbol the provider does not know and a
/// symbol whose request failed are treated alike: both are absent.
pub async fn fetch_quotes(provider: &dyn QuoteProvider, symbols: &[String]) -> Vec<Quote> {
    let results = join_all(symbols.iter().map(|s| provider.get_quote(s))).await;

    results
        .into_iter()
        .zip(symbols)
        .filter_map(|(result, symbol)| match result {
            Ok(quote) => Some(quote),
            Err(e) if e.is_transport() => {
                warn!("Quote fetch for {} failed: {}", symbol, e);
                None
            }
            Err(e) => {
                debug!("Dropping quote for {}: {}", symbol, e);
                None
            }
        })
        .collect()
}
