//! Dashboard stores
//!
//! Each store exclusively owns its in-memory state and persists its
//! durable subset to SQLite after every mutation.

pub mod table;
pub mod watchlist;
pub mod widgets;

pub use table::{TableColumn, TablePage, TableQuery};
pub use watchlist::{Portfolio, PriceAlert, StoreStatus, WatchlistState, WatchlistStore};
pub use widgets::{NewWidget, Widget, WidgetData, WidgetStore, WidgetType};
