//! Services Layer
//!
//! Stateless business logic over [`AppState`](crate::state::AppState) for
//! the read-only market data calls. The stores own everything stateful.
//!
//! # Services
//!
//! - `QuotesService` - Single quotes, trending, search
//! - `HistoryService` - Historical series and supported intervals

pub mod history_service;
pub mod quotes_service;

pub use history_service::{HistoryResult, HistoryService, IntervalsResult};
pub use quotes_service::QuotesService;

use crate::error::{AppError, Result};

/// Trim and upper-case a ticker, rejecting blanks and whitespace
pub fn normalize_symbol(raw: &str) -> Result<String> {
    let symbol = raw.trim();
    if symbol.is_empty() || symbol.chars().any(char::is_whitespace) {
        return Err(AppError::Validation(format!("Invalid symbol: '{}'", raw)));
    }
    Ok(symbol.to_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_symbol() {
        assert_eq!(normalize_symbol(" aapl ").unwrap(), "AAPL");
        assert_eq!(normalize_symbol("tsco.lon").unwrap(), "TSCO.LON");
        assert!(normalize_symbol("   ").is_err());
        assert!(normalize_symbol("BRK B").is_err());
    }
}
