//! Configuration
//!
//! Loaded from an optional JSON file, then overridden by environment
//! variables. Every field has a default so an empty file is valid.

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_PATHS: [&str; 2] = ["stockboard.json", "config/stockboard.json"];

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Quote provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Upstream request budget per minute
    #[serde(default = "default_requests_per_minute")]
    pub max_requests_per_minute: u32,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// Polling loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_watchlist_interval")]
    pub watchlist_interval_secs: u64,
    #[serde(default = "default_widget_tick")]
    pub widget_tick_millis: u64,
    /// Consecutive refresh failures before polling stops
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
}

/// Local storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_db_file")]
    pub db_file: String,
}

/// Chart comparison configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareConfig {
    /// Open sessions kept before the least recently used one is dropped
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub compare: CompareConfig,
    #[serde(default)]
    pub log: LogConfig,
}

fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 8787 }
fn default_base_url() -> String { "https://www.alphavantage.co".to_string() }
fn default_requests_per_minute() -> u32 { 5 }
fn default_timeout() -> u64 { 30 }
fn default_watchlist_interval() -> u64 { 15 }
fn default_widget_tick() -> u64 { 1000 }
fn default_failure_threshold() -> u32 { 3 }
fn default_data_dir() -> PathBuf { PathBuf::from("data") }
fn default_db_file() -> String { "stockboard.db".to_string() }
fn default_max_sessions() -> usize { 32 }
fn default_log_filter() -> String { "stockboard=debug,tower_http=info".to_string() }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            max_requests_per_minute: default_requests_per_minute(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            watchlist_interval_secs: default_watchlist_interval(),
            widget_tick_millis: default_widget_tick(),
            failure_threshold: default_failure_threshold(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            db_file: default_db_file(),
        }
    }
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            max_sessions: default_max_sessions(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl PollingConfig {
    pub fn watchlist_interval(&self) -> Duration {
        Duration::from_secs(self.watchlist_interval_secs)
    }

    pub fn widget_tick(&self) -> Duration {
        Duration::from_millis(self.widget_tick_millis)
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration: `STOCKBOARD_CONFIG`, then the default paths,
    /// then built-in defaults. Environment overrides are applied last.
    ///
    /// Runs before logging is set up, so problems are returned rather than
    /// logged. A config file that exists but does not parse is an error.
    pub fn load() -> Result<Self> {
        let mut config = match Self::find_file() {
            Some(path) => Self::from_file(&path).map_err(|e| {
                AppError::Config(format!("Failed to load {}: {}", path.display(), e))
            })?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// First existing config file, if any
    pub fn find_file() -> Option<PathBuf> {
        std::env::var("STOCKBOARD_CONFIG")
            .ok()
            .into_iter()
            .chain(CONFIG_PATHS.iter().map(|p| p.to_string()))
            .map(PathBuf::from)
            .find(|p| p.exists())
    }

    /// Apply environment overrides through a lookup function
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("ALPHAVANTAGE_API_KEY") {
            self.provider.api_key = key;
        }
        if let Some(dir) = lookup("STOCKBOARD_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Some(host) = lookup("STOCKBOARD_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("STOCKBOARD_PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| AppError::Config(format!("Invalid STOCKBOARD_PORT: {}", port)))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.provider.api_key.trim().is_empty() {
            return Err(AppError::Config(
                "missing quote provider API key (set ALPHAVANTAGE_API_KEY)".to_string(),
            ));
        }
        if self.polling.watchlist_interval_secs == 0 || self.polling.widget_tick_millis == 0 {
            return Err(AppError::Config("polling intervals must be positive".to_string()));
        }
        if self.polling.failure_threshold == 0 {
            return Err(AppError::Config("failure threshold must be positive".to_string()));
        }
        if self.provider.max_requests_per_minute == 0 {
            return Err(AppError::Config("request budget must be positive".to_string()));
        }
        if self.compare.max_sessions == 0 {
            return Err(AppError::Config("comparison session limit must be positive".to_string()));
        }
        Ok(())
    }

    pub fn db_path(&self) -> PathBuf {
        self.storage.data_dir.join(&self.storage.db_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_from_empty_json() {
        let config: AppConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.server.port, 8787);
        assert_eq!(config.polling.watchlist_interval(), Duration::from_secs(15));
        assert_eq!(config.polling.widget_tick(), Duration::from_secs(1));
        assert_eq!(config.polling.failure_threshold, 3);
        assert_eq!(config.provider.max_requests_per_minute, 5);
        assert_eq!(config.compare.max_sessions, 32);
    }

    #[test]
    fn test_partial_json_keeps_other_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"polling": {"failure_threshold": 5}}"#).unwrap();
        assert_eq!(config.polling.failure_threshold, 5);
        assert_eq!(config.polling.watchlist_interval_secs, 15);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("ALPHAVANTAGE_API_KEY", "demo"),
            ("STOCKBOARD_PORT", "9000"),
            ("STOCKBOARD_DATA_DIR", "/tmp/board"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(config.provider.api_key, "demo");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.db_path(), PathBuf::from("/tmp/board/stockboard.db"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let mut config = AppConfig::default();
        let result = config.apply_env(|k| (k == "STOCKBOARD_PORT").then(|| "http".to_string()));
        assert!(matches!(result, Err(AppError::Config(_))));
        assert_eq!(config.server.port, 8787);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stockboard.json");
        fs::write(&path, r#"{"server": {"port": 9100}, "provider": {"api_key": "k"}}"#).unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.provider.api_key, "k");
    }

    #[test]
    fn test_validate_rejects_missing_key_and_zero_intervals() {
        let mut config = AppConfig::default();
        assert!(matches!(config.validate(), Err(AppError::Config(_))));

        config.provider.api_key = "demo".to_string();
        config.polling.widget_tick_millis = 0;
        assert!(matches!(config.validate(), Err(AppError::Config(_))));

        config.polling.widget_tick_millis = 1000;
        config.compare.max_sessions = 0;
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }
}
