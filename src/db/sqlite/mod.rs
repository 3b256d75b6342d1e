//! SQLite database module
//!
//! Holds the persisted subset of the dashboard state as JSON records in a
//! single key-value table.

mod kv;
mod migrations;

use crate::error::Result;
use parking_lot::Mutex;
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// Key of the watchlist/alert store record
pub const STOCK_STORE_KEY: &str = "stock-store";

/// Key of the widget store record
pub const WIDGET_STORE_KEY: &str = "widget-store";

/// SQLite database wrapper
pub struct SqliteDb {
    conn: Mutex<Connection>,
}

impl SqliteDb {
    /// Create new SQLite database connection
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrent access
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        Self::with_connection(conn)
    }

    /// Open a throwaway in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn.lock();
        migrations::run_migrations(&conn)
    }

    // ========== Key-Value Methods ==========

    /// Get a raw JSON record
    pub fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();
        kv::get(&conn, key)
    }

    /// Store a raw JSON record, replacing any previous value
    pub fn put_raw(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock();
        kv::put(&conn, key, value)
    }

    /// Delete a record
    pub fn delete(&self, key: &str) -> Result<()> {
        let conn = self.conn.lock();
        kv::delete(&conn, key)
    }

    /// Load and deserialize a record
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get_raw(key)? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Serialize and store a record
    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        self.put_raw(key, &json)
    }
}
