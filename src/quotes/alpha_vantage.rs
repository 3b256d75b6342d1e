//! Alpha Vantage quote provider

use crate::config::ProviderConfig;
use crate::error::{AppError, Result};
use crate::quotes::rate_limiter::TokenBucket;
use crate::quotes::types::*;
use crate::quotes::QuoteProvider;
use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;
use reqwest::Client;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Alpha Vantage REST client
pub struct AlphaVantageClient {
    client: Client,
    base_url: Url,
    api_key: String,
    limiter: Mutex<TokenBucket>,
}

impl AlphaVantageClient {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(AppError::Config("missing Alpha Vantage API key".to_string()));
        }

        let mut base_url = Url::parse(&config.base_url)
            .map_err(|e| AppError::Config(format!("Invalid provider URL: {}", e)))?;
        base_url.set_path("query");

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("stockboard/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key.clone(),
            limiter: Mutex::new(TokenBucket::per_minute(config.max_requests_per_minute)),
        })
    }

    async fn fetch(&self, params: &[(&str, &str)]) -> Result<Value> {
        {
            let mut limiter = self.limiter.lock();
            if !limiter.try_acquire() {
                warn!(
                    "Upstream budget exhausted, next slot in {:?}",
                    limiter.time_until_available()
                );
                return Err(AppError::RateLimited);
            }
        }

        debug!("Alpha Vantage request: {:?}", params);

        let response = self
            .client
            .get(self.base_url.clone())
            .query(params)
            .query(&[("apikey", self.api_key.as_str())])
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(AppError::RateLimited);
        }
        if !response.status().is_success() {
            return Err(AppError::Provider(format!(
                "unexpected status {}",
                response.status()
            )));
        }

        let json: Value = response.json().await?;
        check_api_message(json)
    }
}

#[async_trait]
impl QuoteProvider for AlphaVantageClient {
    fn id(&self) -> &'static str {
        "alphavantage"
    }

    async fn get_quote(&self, symbol: &str) -> Result<Quote> {
        let json = self
            .fetch(&[("function", "GLOBAL_QUOTE"), ("symbol", symbol)])
            .await?;
        parse_global_quote(&json, symbol)
    }

    async fn get_history(&self, symbol: &str, interval: Interval) -> Result<Vec<HistoricalPoint>> {
        let function = match interval {
            Interval::Daily => "TIME_SERIES_DAILY",
            Interval::Weekly => "TIME_SERIES_WEEKLY",
            Interval::Monthly => "TIME_SERIES_MONTHLY",
        };
        let json = self
            .fetch(&[("function", function), ("symbol", symbol)])
            .await?;
        parse_time_series(&json)
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        let json = self
            .fetch(&[("function", "SYMBOL_SEARCH"), ("keywords", query)])
            .await?;
        parse_search(&json)
    }

    async fn get_trending(&self) -> Result<Vec<TrendingStock>> {
        let json = self.fetch(&[("function", "TOP_GAINERS_LOSERS")]).await?;
        parse_trending(&json)
    }
}

/// Alpha Vantage reports throttling and bad calls inside a 200 body
fn check_api_message(json: Value) -> Result<Value> {
    if let Some(msg) = json.get("Error Message").and_then(Value::as_str) {
        return Err(AppError::NotFound(msg.to_string()));
    }
    if json.get("Note").is_some() {
        return Err(AppError::RateLimited);
    }
    if let Some(msg) = json.get("Information").and_then(Value::as_str) {
        return Err(AppError::Provider(msg.to_string()));
    }
    Ok(json)
}

fn parse_global_quote(json: &Value, symbol: &str) -> Result<Quote> {
    let obj = json
        .get("Global Quote")
        .and_then(Value::as_object)
        .filter(|o| !o.is_empty())
        .ok_or_else(|| AppError::NotFound(format!("No quote for {}", symbol)))?;

    let symbol = obj
        .get("01. symbol")
        .and_then(Value::as_str)
        .unwrap_or(symbol)
        .to_string();

    Ok(Quote {
        name: symbol.clone(),
        symbol,
        open: number(obj, "02. open")?,
        high: number(obj, "03. high")?,
        low: number(obj, "04. low")?,
        price: number(obj, "05. price")?,
        volume: number(obj, "06. volume")? as i64,
        previous_close: number(obj, "08. previous close")?,
        change: number(obj, "09. change")?,
        change_percent: number(obj, "10. change percent")?,
        market_cap: None,
    })
}

fn parse_time_series(json: &Value) -> Result<Vec<HistoricalPoint>> {
    let series = json
        .as_object()
        .and_then(|obj| obj.iter().find(|(k, _)| k.contains("Time Series")))
        .and_then(|(_, v)| v.as_object())
        .ok_or_else(|| AppError::Provider("missing time series in response".to_string()))?;

    let mut points = Vec::with_capacity(series.len());
    for (date, bar) in series {
        let bar = bar
            .as_object()
            .ok_or_else(|| AppError::Provider(format!("bar not an object for {}", date)))?;
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map_err(|e| AppError::Provider(format!("invalid date {}: {}", date, e)))?;

        points.push(HistoricalPoint {
            date,
            open: number(bar, "1. open")?,
            high: number(bar, "2. high")?,
            low: number(bar, "3. low")?,
            close: number(bar, "4. close")?,
            volume: number(bar, "5. volume")? as i64,
        });
    }

    points.sort_by_key(|p| p.date);
    Ok(points)
}

fn parse_search(json: &Value) -> Result<Vec<SearchResult>> {
    let matches = json
        .get("bestMatches")
        .and_then(Value::as_array)
        .ok_or_else(|| AppError::Provider("missing bestMatches".to_string()))?;

    Ok(matches
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|m| {
            Some(SearchResult {
                symbol: text(m, "1. symbol")?,
                name: text(m, "2. name").unwrap_or_default(),
                instrument_type: text(m, "3. type").unwrap_or_default(),
                region: text(m, "4. region").unwrap_or_default(),
                currency: text(m, "8. currency").unwrap_or_default(),
                match_score: number(m, "9. matchScore").ok(),
            })
        })
        .collect())
}

fn parse_trending(json: &Value) -> Result<Vec<TrendingStock>> {
    let active = json
        .get("most_actively_traded")
        .and_then(Value::as_array)
        .ok_or_else(|| AppError::Provider("missing most_actively_traded".to_string()))?;

    active
        .iter()
        .filter_map(Value::as_object)
        .map(|row| {
            Ok(TrendingStock {
                symbol: text(row, "ticker")
                    .ok_or_else(|| AppError::Provider("trending row without ticker".to_string()))?,
                price: number(row, "price")?,
                change: number(row, "change_amount")?,
                change_percent: number(row, "change_percentage")?,
                volume: number(row, "volume")? as i64,
            })
        })
        .collect()
}

fn text(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Alpha Vantage sends numbers as strings, percentages with a trailing `%`
fn number(obj: &Map<String, Value>, key: &str) -> Result<f64> {
    let value = obj
        .get(key)
        .ok_or_else(|| AppError::Provider(format!("missing field {}", key)))?;

    if let Some(n) = value.as_f64() {
        return Ok(n);
    }

    value
        .as_str()
        .map(|s| s.trim().trim_end_matches('%'))
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| AppError::Provider(format!("non-numeric field {}", key)))
}
