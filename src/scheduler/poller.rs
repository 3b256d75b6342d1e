//! Fixed-interval poller
//!
//! Each tick spawns its work as a separate task, so stopping the poller only
//! prevents future ticks. Work already started keeps running to completion.

use parking_lot::Mutex;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::info;

/// Fixed-interval background loop
pub struct Poller {
    name: &'static str,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Poller {
    /// Create a stopped poller
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            handle: Mutex::new(None),
        }
    }

    /// Start ticking every `period`, first tick one period from now.
    ///
    /// Returns `false` without doing anything if the poller is already running.
    pub fn start<F, Fut>(&self, period: Duration, tick: F) -> bool
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut handle = self.handle.lock();
        if handle.as_ref().is_some_and(|h| !h.is_finished()) {
            return false;
        }

        let name = self.name;
        *handle = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                tracing::trace!("{} poller tick", name);
                tokio::spawn(tick());
            }
        }));

        info!("{} poller started ({:?} interval)", self.name, period);
        true
    }

    /// Stop the poller. Returns `false` if it was not running.
    pub fn stop(&self) -> bool {
        match self.handle.lock().take() {
            Some(handle) => {
                handle.abort();
                info!("{} poller stopped", self.name);
                true
            }
            None => false,
        }
    }

    /// Check if the poller is running
    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.get_mut().take() {
            handle.abort();
        }
    }
}
