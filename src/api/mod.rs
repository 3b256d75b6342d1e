//! Dashboard REST API
//!
//! Exposes store state and the presentation intents (watchlist, alerts,
//! portfolios, widgets, comparisons) over HTTP.

pub mod handlers;
pub mod server;
pub mod types;

pub use server::{router, ApiServer};
pub use types::ApiResponse;
