//! Chart comparison engine
//!
//! Each comparison is a session holding compared symbols, their series for
//! the active timeframe and the normalization flag. Operations on a session
//! are serialized by its async mutex, so a timeframe switch and an add never
//! interleave.

mod series;
mod session;

pub use series::{compute_series, Alignment, ComparisonPoint};
pub use session::ComparisonSession;

use crate::error::{AppError, Result};
use crate::quotes::{Interval, Quote, QuoteProvider};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

/// Serializable snapshot of a session with its computed chart
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonView {
    pub id: String,
    pub symbols: Vec<Quote>,
    pub timeframe: Interval,
    pub normalize: bool,
    pub alignment: Alignment,
    pub series: Vec<ComparisonPoint>,
}

struct SessionEntry {
    session: Arc<Mutex<ComparisonSession>>,
    last_used: u64,
}

/// Owner of all comparison sessions.
///
/// At most `max_sessions` are kept; opening one more drops the session
/// that was used least recently.
pub struct ComparisonEngine {
    provider: Arc<dyn QuoteProvider>,
    sessions: DashMap<String, SessionEntry>,
    max_sessions: usize,
    clock: AtomicU64,
}

impl ComparisonEngine {
    pub fn new(provider: Arc<dyn QuoteProvider>, max_sessions: usize) -> Self {
        Self {
            provider,
            sessions: DashMap::new(),
            max_sessions: max_sessions.max(1),
            clock: AtomicU64::new(0),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    /// Open an empty session and return its id
    pub fn create_session(&self) -> String {
        while self.sessions.len() >= self.max_sessions {
            let oldest = self
                .sessions
                .iter()
                .min_by_key(|entry| entry.value().last_used)
                .map(|entry| entry.key().clone());
            match oldest {
                Some(old) => {
                    self.sessions.remove(&old);
                    info!("Comparison session {} evicted", old);
                }
                None => break,
            }
        }

        let id = Uuid::new_v4().to_string();
        let entry = SessionEntry {
            session: Arc::new(Mutex::new(ComparisonSession::new())),
            last_used: self.tick(),
        };
        self.sessions.insert(id.clone(), entry);
        info!("Comparison session {} created", id);
        id
    }

    /// Look up a session, marking it as recently used
    pub fn get(&self, id: &str) -> Result<Arc<Mutex<ComparisonSession>>> {
        let mut entry = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("Comparison not found: {}", id)))?;
        entry.last_used = self.tick();
        Ok(entry.session.clone())
    }

    /// Returns `false` if no session had that id
    pub fn remove(&self, id: &str) -> bool {
        self.sessions.remove(id).is_some()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub async fn add_symbol(&self, id: &str, symbol: &str) -> Result<bool> {
        let session = self.get(id)?;
        let mut session = session.lock().await;
        session.add_symbol(self.provider.as_ref(), symbol).await
    }

    pub async fn remove_symbol(&self, id: &str, symbol: &str) -> Result<bool> {
        let session = self.get(id)?;
        let removed = session.lock().await.remove_symbol(symbol);
        Ok(removed)
    }

    pub async fn set_timeframe(&self, id: &str, timeframe: Interval) -> Result<()> {
        let session = self.get(id)?;
        let mut session = session.lock().await;
        session.set_timeframe(self.provider.as_ref(), timeframe).await;
        Ok(())
    }

    pub async fn set_normalize(&self, id: &str, normalize: bool) -> Result<()> {
        let session = self.get(id)?;
        session.lock().await.set_normalize(normalize);
        Ok(())
    }

    /// Snapshot with computed series. `normalize` overrides the session flag
    /// for this call only.
    pub async fn view(
        &self,
        id: &str,
        normalize: Option<bool>,
        alignment: Alignment,
    ) -> Result<ComparisonView> {
        let session = self.get(id)?;
        let session = session.lock().await;
        let normalize = normalize.unwrap_or(session.normalize);

        Ok(ComparisonView {
            id: id.to_string(),
            symbols: session.symbols.clone(),
            timeframe: session.timeframe,
            normalize,
            alignment,
            series: session.compute_series(normalize, alignment),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quotes::mock::{series, MockProvider, Scripted};

    fn engine() -> ComparisonEngine {
        let provider = MockProvider::new().with_quote("A", 10.0).with_quote("B", 20.0);
        provider.set_history("A", Interval::Daily, Scripted::Ok(series(&[10.0, 12.0, 9.0])));
        provider.set_history("B", Interval::Daily, Scripted::Ok(series(&[20.0, 30.0])));
        ComparisonEngine::new(Arc::new(provider), 4)
    }

    #[tokio::test]
    async fn test_view_uses_session_normalize_flag() {
        let engine = engine();
        let id = engine.create_session();
        engine.add_symbol(&id, "A").await.unwrap();
        engine.add_symbol(&id, "B").await.unwrap();

        let view = engine.view(&id, None, Alignment::Positional).await.unwrap();
        assert!(view.normalize);
        assert_eq!(view.series.len(), 3);
        assert_eq!(view.series[1].values["A"], 20.0);
        assert_eq!(view.series[1].values["B"], 50.0);

        engine.set_normalize(&id, false).await.unwrap();
        let raw = engine.view(&id, None, Alignment::Positional).await.unwrap();
        assert_eq!(raw.series[2].values["A"], 9.0);
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let engine = engine();
        assert!(engine.add_symbol("missing", "A").await.unwrap_err().is_not_found());
        assert!(engine.view("missing", None, Alignment::ByDate).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_remove_session() {
        let engine = engine();
        let id = engine.create_session();
        assert_eq!(engine.session_count(), 1);
        assert!(engine.remove(&id));
        assert!(!engine.remove(&id));
        assert_eq!(engine.session_count(), 0);
    }

    #[tokio::test]
    async fn test_least_recently_used_session_is_evicted() {
        let engine = engine();
        let ids: Vec<String> = (0..4).map(|_| engine.create_session()).collect();
        engine.add_symbol(&ids[0], "A").await.unwrap();

        let newest = engine.create_session();
        assert_eq!(engine.session_count(), 4);
        assert!(engine.get(&ids[1]).unwrap_err().is_not_found());
        assert!(engine.get(&ids[0]).is_ok());
        assert!(engine.get(&newest).is_ok());

        for _ in 0..10 {
            engine.create_session();
        }
        assert_eq!(engine.session_count(), 4);
    }
}
