//! Quotes Service
//!
//! Handles single quotes, the trending snapshot and symbol search.

use crate::error::{AppError, Result};
use crate::quotes::{Quote, SearchResult, TrendingStock};
use crate::services::normalize_symbol;
use crate::state::AppState;
use tracing::info;

/// Quotes service for business logic
pub struct QuotesService;

impl QuotesService {
    /// Get a single quote
    pub async fn get_quote(state: &AppState, symbol: &str) -> Result<Quote> {
        let symbol = normalize_symbol(symbol)?;
        info!("QuotesService::get_quote - {}", symbol);
        state.provider.get_quote(&symbol).await
    }

    /// Last trending snapshot held by the watchlist store
    pub fn get_trending(state: &AppState) -> Vec<TrendingStock> {
        state.watchlist.snapshot().trending_stocks
    }

    /// Search symbols by keywords
    pub async fn search(state: &AppState, query: &str) -> Result<Vec<SearchResult>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::Validation("Search query is empty".to_string()));
        }

        info!("QuotesService::search - '{}'", query);
        state.provider.search(query).await
    }
}
