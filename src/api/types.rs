//! Dashboard API request and response types

use crate::quotes::{Interval, Quote, TrendingStock};
use crate::stores::{Portfolio, PriceAlert, StoreStatus};
use serde::{Deserialize, Serialize};

/// Standard API response envelope
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success_with_message(message: &str) -> Self {
        Self {
            status: "success".to_string(),
            message: Some(message.to_string()),
            data: None,
        }
    }

    pub fn success_with_data(data: T) -> Self {
        Self {
            status: "success".to_string(),
            message: None,
            data: Some(data),
        }
    }
}

/// Empty payload for responses without data
#[derive(Debug, Clone, Serialize)]
pub struct Empty {}

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct SymbolRequest {
    pub symbol: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAlertRequest {
    pub symbol: String,
    pub target_price: f64,
    pub is_above: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePortfolioRequest {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActivePortfolioRequest {
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReorderRequest {
    pub from: usize,
    pub to: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateComparisonRequest {
    #[serde(default)]
    pub symbols: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimeframeRequest {
    pub timeframe: Interval,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NormalizeRequest {
    pub normalize: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryQuery {
    pub interval: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ComparisonQuery {
    pub normalize: Option<bool>,
    pub align: Option<String>,
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct HealthData {
    pub name: &'static str,
    pub version: &'static str,
    pub provider: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchlistData {
    pub symbols: Vec<String>,
    pub stocks: Vec<Quote>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendingData {
    pub stocks: Vec<TrendingStock>,
    pub revision: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfoliosData {
    pub portfolios: Vec<Portfolio>,
    pub active_portfolio: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertsData {
    pub alerts: Vec<PriceAlert>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonCreated {
    pub id: String,
    /// Requested symbols that could not be added
    pub rejected: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusData {
    #[serde(flatten)]
    pub status: StoreStatus,
    pub widgets_polling: bool,
}
