//! History Service
//!
//! Handles historical series retrieval from the quote provider.

use crate::error::Result;
use crate::quotes::{HistoricalPoint, Interval};
use crate::services::normalize_symbol;
use crate::state::AppState;
use serde::{Deserialize, Serialize};
use tracing::info;

/// History result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResult {
    pub symbol: String,
    pub interval: Interval,
    pub candles: Vec<HistoricalPoint>,
}

/// Supported intervals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntervalsResult {
    pub intervals: Vec<String>,
}

/// History service for business logic
pub struct HistoryService;

impl HistoryService {
    /// Get a historical series, ascending by date
    pub async fn get_history(
        state: &AppState,
        symbol: &str,
        interval: Interval,
    ) -> Result<HistoryResult> {
        let symbol = normalize_symbol(symbol)?;
        info!("HistoryService::get_history - {} {}", symbol, interval);

        let candles = state.provider.get_history(&symbol, interval).await?;

        Ok(HistoryResult {
            symbol,
            interval,
            candles,
        })
    }

    /// Get supported intervals
    pub fn get_intervals() -> IntervalsResult {
        IntervalsResult {
            intervals: Interval::all().iter().map(|i| i.to_string()).collect(),
        }
    }
}
