//! Scheduler module for StockBoard
//!
//! Fixed-interval polling loops with an explicit start/stop lifecycle:
//! - Watchlist/trending refresh (15 s by default)
//! - Widget refresh tick (1 s by default)

mod poller;

pub use poller::Poller;
