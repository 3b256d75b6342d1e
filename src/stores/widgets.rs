//! Widget store
//!
//! Widgets are user-defined display units bound to symbols. Their data is
//! shaped by type: a single quote for a card, a quote list for a table and a
//! flattened daily series for a chart. The list is persisted after every
//! mutation, including data refreshes.

use crate::config::PollingConfig;
use crate::db::sqlite::{SqliteDb, WIDGET_STORE_KEY};
use crate::error::{AppError, Result};
use crate::quotes::{fetch_quotes, HistoricalPoint, Interval, Quote, QuoteProvider};
use crate::scheduler::Poller;
use crate::stores::table::{table_view, TablePage, TableQuery};
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Widget display mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WidgetType {
    Card,
    Table,
    Chart,
}

/// Widget payload, tagged by display mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum WidgetData {
    Card(Quote),
    Table(Vec<Quote>),
    Chart(Vec<HistoricalPoint>),
}

impl WidgetData {
    pub fn kind(&self) -> WidgetType {
        match self {
            WidgetData::Card(_) => WidgetType::Card,
            WidgetData::Table(_) => WidgetType::Table,
            WidgetData::Chart(_) => WidgetType::Chart,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Widget {
    pub id: String,
    pub title: String,
    #[serde(flatten)]
    pub data: WidgetData,
    pub symbols: Vec<String>,
    pub created_at: DateTime<Utc>,
    /// Auto-refresh period in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_interval: Option<u64>,
    /// Set when the last refresh failed, cleared by the next good one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl Widget {
    pub fn kind(&self) -> WidgetType {
        self.data.kind()
    }
}

/// Add-widget request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewWidget {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: WidgetType,
    pub symbols: Vec<String>,
    #[serde(default)]
    pub refresh_interval: Option<u64>,
}

/// Persisted record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedWidgets {
    #[serde(default)]
    pub widgets: Vec<Widget>,
}

/// Fetch and shape data for a widget type
pub async fn fetch_widget_data(
    provider: &dyn QuoteProvider,
    kind: WidgetType,
    symbols: &[String],
) -> Result<WidgetData> {
    match kind {
        WidgetType::Card => match symbols {
            [symbol] => Ok(WidgetData::Card(provider.get_quote(symbol).await?)),
            _ => Err(AppError::Validation(format!(
                "card widget needs exactly one symbol, got {}",
                symbols.len()
            ))),
        },
        WidgetType::Table => Ok(WidgetData::Table(fetch_quotes(provider, symbols).await)),
        WidgetType::Chart => {
            if symbols.is_empty() {
                return Err(AppError::Validation(
                    "chart widget needs at least one symbol".to_string(),
                ));
            }

            let results =
                join_all(symbols.iter().map(|s| provider.get_history(s, Interval::Daily))).await;

            let mut points = Vec::new();
            let mut loaded = 0;
            let mut last_error = None;
            for (result, symbol) in results.into_iter().zip(symbols) {
                match result {
                    Ok(series) => {
                        loaded += 1;
                        points.extend(series);
                    }
                    Err(e) => {
                        debug!("Skipping chart series for {}: {}", symbol, e);
                        last_error = Some(e);
                    }
                }
            }

            // No series loaded at all counts as a failed fetch
            match (loaded, last_error) {
                (0, Some(e)) => Err(e),
                _ => Ok(WidgetData::Chart(points)),
            }
        }
    }
}

/// Ids of widgets whose refresh interval has elapsed at `now`.
///
/// Widgets without an interval are never due. A widget with no recorded
/// refresh is due immediately.
pub fn due_widgets(
    widgets: &[Widget],
    last_refreshed: &HashMap<String, Instant>,
    now: Instant,
) -> Vec<String> {
    widgets
        .iter()
        .filter_map(|w| {
            let period = Duration::from_millis(w.refresh_interval?);
            let due = match last_refreshed.get(&w.id) {
                Some(at) => now.saturating_duration_since(*at) >= period,
                None => true,
            };
            due.then(|| w.id.clone())
        })
        .collect()
}

/// Widget store
pub struct WidgetStore {
    provider: Arc<dyn QuoteProvider>,
    db: Arc<SqliteDb>,
    widgets: RwLock<Vec<Widget>>,
    last_refreshed: Mutex<HashMap<String, Instant>>,
    poller: Poller,
    tick: Duration,
}

impl WidgetStore {
    /// Create the store, rehydrating persisted widgets
    pub fn new(
        provider: Arc<dyn QuoteProvider>,
        db: Arc<SqliteDb>,
        polling: &PollingConfig,
    ) -> Arc<Self> {
        let persisted = match db.load::<PersistedWidgets>(WIDGET_STORE_KEY) {
            Ok(p) => p.unwrap_or_default(),
            Err(e) => {
                warn!("Discarding unreadable {} record: {}", WIDGET_STORE_KEY, e);
                PersistedWidgets::default()
            }
        };

        info!("Widget store loaded: {} widgets", persisted.widgets.len());

        Arc::new(Self {
            provider,
            db,
            widgets: RwLock::new(persisted.widgets),
            last_refreshed: Mutex::new(HashMap::new()),
            poller: Poller::new("widgets"),
            tick: polling.widget_tick(),
        })
    }

    /// Apply a change to the list and persist the result
    fn mutate<R>(&self, f: impl FnOnce(&mut Vec<Widget>) -> R) -> R {
        let (result, snapshot) = {
            let mut widgets = self.widgets.write();
            let result = f(&mut widgets);
            (result, PersistedWidgets { widgets: widgets.clone() })
        };

        if let Err(e) = self.db.save(WIDGET_STORE_KEY, &snapshot) {
            error!("Failed to persist {}: {}", WIDGET_STORE_KEY, e);
        }
        result
    }

    pub fn widgets(&self) -> Vec<Widget> {
        self.widgets.read().clone()
    }

    pub fn get(&self, id: &str) -> Option<Widget> {
        self.widgets.read().iter().find(|w| w.id == id).cloned()
    }

    /// Fetch initial data and append the widget.
    /// On failure nothing is stored.
    pub async fn add_widget(&self, spec: NewWidget) -> Result<Widget> {
        let data = fetch_widget_data(self.provider.as_ref(), spec.kind, &spec.symbols)
            .await
            .map_err(|e| {
                error!("Failed to add widget '{}': {}", spec.title, e);
                e
            })?;

        let widget = Widget {
            id: Uuid::new_v4().to_string(),
            title: spec.title,
            data,
            symbols: spec.symbols,
            created_at: Utc::now(),
            refresh_interval: spec.refresh_interval,
            last_error: None,
        };

        self.last_refreshed.lock().insert(widget.id.clone(), Instant::now());
        self.mutate(|widgets| widgets.push(widget.clone()));
        info!("Added {:?} widget {}", widget.kind(), widget.id);
        Ok(widget)
    }

    /// Replace a widget's data. Returns `false` for an unknown id.
    pub fn update_widget_data(&self, id: &str, data: WidgetData) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        self.mutate(|widgets| match widgets.iter_mut().find(|w| w.id == id) {
            Some(widget) => {
                widget.data = data;
                widget.last_error = None;
                true
            }
            None => false,
        })
    }

    /// Re-fetch a widget's data in place.
    ///
    /// An unknown id is a silent no-op and yields `Ok(None)`. A failed fetch
    /// keeps the old data but flags the widget with `last_error`.
    pub async fn refresh_widget(&self, id: &str) -> Result<Option<Widget>> {
        let Some(widget) = self.get(id) else {
            return Ok(None);
        };

        match fetch_widget_data(self.provider.as_ref(), widget.kind(), &widget.symbols).await {
            Ok(data) => {
                self.update_widget_data(id, data);
                Ok(self.get(id))
            }
            Err(e) => {
                warn!("Failed to refresh widget {}: {}", id, e);
                let message = e.to_string();
                self.mutate(|widgets| {
                    if let Some(w) = widgets.iter_mut().find(|w| w.id == id) {
                        w.last_error = Some(message);
                    }
                });
                Err(e)
            }
        }
    }

    /// Returns `false` if no widget had that id
    pub fn remove_widget(&self, id: &str) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        self.last_refreshed.lock().remove(id);
        self.mutate(|widgets| widgets.retain(|w| w.id != id));
        true
    }

    pub fn clear_widgets(&self) {
        self.last_refreshed.lock().clear();
        self.mutate(Vec::clear);
    }

    /// Move the widget at `from` to position `to`, shifting the rest
    pub fn reorder_widgets(&self, from: usize, to: usize) -> Result<()> {
        let len = self.widgets.read().len();
        if from >= len || to >= len {
            return Err(AppError::Validation(format!(
                "reorder indices {} -> {} out of range for {} widgets",
                from, to, len
            )));
        }
        if from == to {
            return Ok(());
        }

        self.mutate(|widgets| {
            let widget = widgets.remove(from);
            widgets.insert(to, widget);
        });
        Ok(())
    }

    /// Filtered, sorted page of a table widget's rows
    pub fn table_view(&self, id: &str, query: &TableQuery) -> Result<TablePage> {
        let widgets = self.widgets.read();
        let widget = widgets
            .iter()
            .find(|w| w.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Widget not found: {}", id)))?;

        match &widget.data {
            WidgetData::Table(rows) => Ok(table_view(rows, query)),
            other => Err(AppError::Validation(format!(
                "widget {} is a {:?} widget, not a table",
                id,
                other.kind()
            ))),
        }
    }

    /// Refresh every widget whose interval has elapsed
    pub async fn refresh_due(&self) {
        let now = Instant::now();
        let due = {
            let widgets = self.widgets.read();
            let mut last = self.last_refreshed.lock();
            let due = due_widgets(&widgets, &last, now);
            for id in &due {
                last.insert(id.clone(), now);
            }
            due
        };

        if due.is_empty() {
            return;
        }

        debug!("Refreshing {} due widgets", due.len());
        join_all(due.iter().map(|id| self.refresh_widget(id))).await;
    }

    /// Start the widget tick. A second call while running is a no-op.
    pub fn start_refresh_polling(self: &Arc<Self>) -> bool {
        let store = Arc::downgrade(self);
        self.poller.start(self.tick, move || {
            let store = store.clone();
            async move {
                if let Some(store) = store.upgrade() {
                    store.refresh_due().await;
                }
            }
        })
    }

    pub fn stop_refresh_polling(&self) -> bool {
        self.poller.stop()
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_running()
    }
}
