//! Local storage

pub mod sqlite;

pub use sqlite::SqliteDb;
