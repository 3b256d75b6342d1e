//! Dashboard API endpoint handlers

use crate::api::types::*;
use crate::compare::{Alignment, ComparisonView};
use crate::error::{AppError, Result};
use crate::quotes::{Interval, Quote, SearchResult};
use crate::services::{
    normalize_symbol, HistoryResult, HistoryService, IntervalsResult, QuotesService,
};
use crate::state::AppState;
use crate::stores::{NewWidget, Portfolio, PriceAlert, TablePage, TableQuery, Widget};
use axum::extract::{Json, Path, Query, State as AxumState};
use std::sync::Arc;
use tracing::{info, warn};

type ApiResult<T> = Result<Json<ApiResponse<T>>>;

fn ok<T: serde::Serialize>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::success_with_data(data)))
}

fn done(message: &str) -> ApiResult<Empty> {
    Ok(Json(ApiResponse::success_with_message(message)))
}

// ============================================================================
// Health Check
// ============================================================================

/// Health check endpoint
pub async fn health_check(AxumState(state): AxumState<Arc<AppState>>) -> ApiResult<HealthData> {
    ok(HealthData {
        name: "stockboard",
        version: env!("CARGO_PKG_VERSION"),
        provider: state.provider.id(),
    })
}

// ============================================================================
// Stocks
// ============================================================================

fn status_data(state: &AppState) -> StatusData {
    StatusData {
        status: state.watchlist.status(),
        widgets_polling: state.widgets.is_polling(),
    }
}

pub async fn stocks_status(AxumState(state): AxumState<Arc<AppState>>) -> ApiResult<StatusData> {
    ok(status_data(&state))
}

pub async fn trending(AxumState(state): AxumState<Arc<AppState>>) -> ApiResult<TrendingData> {
    let revision = state.watchlist.status().trending_revision;
    ok(TrendingData {
        stocks: QuotesService::get_trending(&state),
        revision,
    })
}

/// Run one refresh now without touching the poller
pub async fn refresh_stocks(AxumState(state): AxumState<Arc<AppState>>) -> ApiResult<StatusData> {
    state.watchlist.refresh_stocks().await;
    ok(status_data(&state))
}

/// Clear the failure circuit and restart polling
pub async fn retry_stocks(AxumState(state): AxumState<Arc<AppState>>) -> ApiResult<StatusData> {
    info!("Retry requested from dashboard");
    state.watchlist.reset_and_retry_stocks().await;
    ok(status_data(&state))
}

pub async fn get_quote(
    AxumState(state): AxumState<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> ApiResult<Quote> {
    ok(QuotesService::get_quote(&state, &symbol).await?)
}

pub async fn get_history(
    AxumState(state): AxumState<Arc<AppState>>,
    Path(symbol): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<HistoryResult> {
    let interval = match query.interval.as_deref() {
        Some(raw) => raw.parse::<Interval>()?,
        None => Interval::default(),
    };
    ok(HistoryService::get_history(&state, &symbol, interval).await?)
}

pub async fn get_intervals() -> ApiResult<IntervalsResult> {
    ok(HistoryService::get_intervals())
}

pub async fn search(
    AxumState(state): AxumState<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Vec<SearchResult>> {
    ok(QuotesService::search(&state, &query.q).await?)
}

// ============================================================================
// Watchlist
// ============================================================================

fn watchlist_data(state: &AppState) -> WatchlistData {
    let snapshot = state.watchlist.snapshot();
    WatchlistData {
        symbols: snapshot.watchlist,
        stocks: snapshot.watchlist_stocks,
    }
}

pub async fn get_watchlist(AxumState(state): AxumState<Arc<AppState>>) -> ApiResult<WatchlistData> {
    ok(watchlist_data(&state))
}

pub async fn add_to_watchlist(
    AxumState(state): AxumState<Arc<AppState>>,
    Json(req): Json<SymbolRequest>,
) -> ApiResult<WatchlistData> {
    let symbol = normalize_symbol(&req.symbol)?;
    state.watchlist.add_to_watchlist(&symbol);
    ok(watchlist_data(&state))
}

pub async fn remove_from_watchlist(
    AxumState(state): AxumState<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> ApiResult<WatchlistData> {
    let symbol = normalize_symbol(&symbol)?;
    state.watchlist.remove_from_watchlist(&symbol);
    ok(watchlist_data(&state))
}

// ============================================================================
// Price Alerts
// ============================================================================

pub async fn list_alerts(AxumState(state): AxumState<Arc<AppState>>) -> ApiResult<AlertsData> {
    ok(AlertsData {
        alerts: state.watchlist.snapshot().price_alerts,
    })
}

pub async fn create_alert(
    AxumState(state): AxumState<Arc<AppState>>,
    Json(req): Json<CreateAlertRequest>,
) -> ApiResult<PriceAlert> {
    let symbol = normalize_symbol(&req.symbol)?;
    if !req.target_price.is_finite() || req.target_price <= 0.0 {
        return Err(AppError::Validation(format!(
            "Target price must be positive, got {}",
            req.target_price
        )));
    }

    ok(state
        .watchlist
        .create_price_alert(&symbol, req.target_price, req.is_above))
}

pub async fn delete_alert(
    AxumState(state): AxumState<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Empty> {
    if !state.watchlist.delete_price_alert(&id) {
        return Err(AppError::NotFound(format!("Alert not found: {}", id)));
    }
    done("Alert deleted")
}

pub async fn alerted_stocks(AxumState(state): AxumState<Arc<AppState>>) -> ApiResult<Vec<Quote>> {
    ok(state.watchlist.get_alerted_stocks().await)
}

pub async fn triggered_alerts(AxumState(state): AxumState<Arc<AppState>>) -> ApiResult<AlertsData> {
    ok(AlertsData {
        alerts: state.watchlist.snapshot().triggered_alerts,
    })
}

pub async fn clear_triggered_alerts(
    AxumState(state): AxumState<Arc<AppState>>,
) -> ApiResult<Empty> {
    state.watchlist.clear_triggered_alerts();
    done("Triggered alerts cleared")
}

// ============================================================================
// Portfolios
// ============================================================================

pub async fn list_portfolios(
    AxumState(state): AxumState<Arc<AppState>>,
) -> ApiResult<PortfoliosData> {
    let snapshot = state.watchlist.snapshot();
    ok(PortfoliosData {
        portfolios: snapshot.portfolios,
        active_portfolio: snapshot.active_portfolio,
    })
}

pub async fn create_portfolio(
    AxumState(state): AxumState<Arc<AppState>>,
    Json(req): Json<CreatePortfolioRequest>,
) -> ApiResult<Portfolio> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Portfolio name is empty".to_string()));
    }
    ok(state.watchlist.create_portfolio(name))
}

pub async fn delete_portfolio(
    AxumState(state): AxumState<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Empty> {
    if !state.watchlist.delete_portfolio(&id) {
        return Err(AppError::NotFound(format!("Portfolio not found: {}", id)));
    }
    done("Portfolio deleted")
}

pub async fn add_to_portfolio(
    AxumState(state): AxumState<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<SymbolRequest>,
) -> ApiResult<Empty> {
    let symbol = normalize_symbol(&req.symbol)?;
    state.watchlist.add_to_portfolio(&id, &symbol)?;
    done("Symbol added to portfolio")
}

pub async fn remove_from_portfolio(
    AxumState(state): AxumState<Arc<AppState>>,
    Path((id, symbol)): Path<(String, String)>,
) -> ApiResult<Empty> {
    let symbol = normalize_symbol(&symbol)?;
    state.watchlist.remove_from_portfolio(&id, &symbol)?;
    done("Symbol removed from portfolio")
}

pub async fn portfolio_stocks(
    AxumState(state): AxumState<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Vec<Quote>> {
    ok(state.watchlist.get_portfolio_stocks(&id).await?)
}

pub async fn set_active_portfolio(
    AxumState(state): AxumState<Arc<AppState>>,
    Json(req): Json<ActivePortfolioRequest>,
) -> ApiResult<Empty> {
    state.watchlist.set_active_portfolio(req.id.as_deref())?;
    done("Active portfolio updated")
}

// ============================================================================
// Widgets
// ============================================================================

pub async fn list_widgets(AxumState(state): AxumState<Arc<AppState>>) -> ApiResult<Vec<Widget>> {
    ok(state.widgets.widgets())
}

pub async fn add_widget(
    AxumState(state): AxumState<Arc<AppState>>,
    Json(mut req): Json<NewWidget>,
) -> ApiResult<Widget> {
    req.symbols = req
        .symbols
        .iter()
        .map(|s| normalize_symbol(s))
        .collect::<Result<Vec<_>>>()?;
    ok(state.widgets.add_widget(req).await?)
}

pub async fn clear_widgets(AxumState(state): AxumState<Arc<AppState>>) -> ApiResult<Empty> {
    state.widgets.clear_widgets();
    done("Widgets cleared")
}

pub async fn remove_widget(
    AxumState(state): AxumState<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Empty> {
    if !state.widgets.remove_widget(&id) {
        return Err(AppError::NotFound(format!("Widget not found: {}", id)));
    }
    done("Widget removed")
}

pub async fn refresh_widget(
    AxumState(state): AxumState<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Widget> {
    match state.widgets.refresh_widget(&id).await? {
        Some(widget) => ok(widget),
        None => Err(AppError::NotFound(format!("Widget not found: {}", id))),
    }
}

pub async fn reorder_widgets(
    AxumState(state): AxumState<Arc<AppState>>,
    Json(req): Json<ReorderRequest>,
) -> ApiResult<Vec<Widget>> {
    state.widgets.reorder_widgets(req.from, req.to)?;
    ok(state.widgets.widgets())
}

pub async fn widget_table(
    AxumState(state): AxumState<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<TableQuery>,
) -> ApiResult<TablePage> {
    ok(state.widgets.table_view(&id, &query)?)
}

// ============================================================================
// Chart Comparison
// ============================================================================

pub async fn create_comparison(
    AxumState(state): AxumState<Arc<AppState>>,
    body: Option<Json<CreateComparisonRequest>>,
) -> ApiResult<ComparisonCreated> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let id = state.compare.create_session();

    let mut rejected = Vec::new();
    for raw in &req.symbols {
        let added = match normalize_symbol(raw) {
            Ok(symbol) => state.compare.add_symbol(&id, &symbol).await,
            Err(e) => Err(e),
        };
        if let Err(e) = added {
            warn!("Comparison {}: could not add {}: {}", id, raw, e);
            rejected.push(raw.clone());
        }
    }

    ok(ComparisonCreated { id, rejected })
}

pub async fn get_comparison(
    AxumState(state): AxumState<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<ComparisonQuery>,
) -> ApiResult<ComparisonView> {
    let alignment = match query.align.as_deref() {
        Some(raw) => raw.parse::<Alignment>()?,
        None => Alignment::default(),
    };
    ok(state.compare.view(&id, query.normalize, alignment).await?)
}

pub async fn delete_comparison(
    AxumState(state): AxumState<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Empty> {
    if !state.compare.remove(&id) {
        return Err(AppError::NotFound(format!("Comparison not found: {}", id)));
    }
    done("Comparison deleted")
}

pub async fn add_compared_symbol(
    AxumState(state): AxumState<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<SymbolRequest>,
) -> ApiResult<ComparisonView> {
    let symbol = normalize_symbol(&req.symbol)?;
    state.compare.add_symbol(&id, &symbol).await?;
    ok(state.compare.view(&id, None, Alignment::default()).await?)
}

pub async fn remove_compared_symbol(
    AxumState(state): AxumState<Arc<AppState>>,
    Path((id, symbol)): Path<(String, String)>,
) -> ApiResult<ComparisonView> {
    let symbol = normalize_symbol(&symbol)?;
    state.compare.remove_symbol(&id, &symbol).await?;
    ok(state.compare.view(&id, None, Alignment::default()).await?)
}

pub async fn set_comparison_timeframe(
    AxumState(state): AxumState<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<TimeframeRequest>,
) -> ApiResult<ComparisonView> {
    state.compare.set_timeframe(&id, req.timeframe).await?;
    ok(state.compare.view(&id, None, Alignment::default()).await?)
}

pub async fn set_comparison_normalize(
    AxumState(state): AxumState<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<NormalizeRequest>,
) -> ApiResult<ComparisonView> {
    state.compare.set_normalize(&id, req.normalize).await?;
    ok(state.compare.view(&id, None, Alignment::default()).await?)
}
