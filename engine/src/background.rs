//! Background refresh trigger.
//!
//! Runs one sync attempt on start, then keeps calling `sync()` on a fixed
//! interval while the host runs. Hosts that cannot schedule background work
//! pass no interval and rely on connectivity transitions alone.

use crate::{SyncOrchestrator, SyncOutcome};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Default period of the background sync loop.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Periodic sync driver.
#[derive(Debug)]
pub struct BackgroundRefresh {
    sync: Arc<SyncOrchestrator>,
    interval: Option<Duration>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl BackgroundRefresh {
    pub fn new(sync: Arc<SyncOrchestrator>, interval: Option<Duration>) -> Self {
        Self {
            sync,
            interval,
            task: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// Start the trigger: one immediate attempt, then the periodic loop.
    ///
    /// Calling `start` again restarts the loop.
    pub fn start(&self) {
        let sync = Arc::clone(&self.sync);
        let interval = self.interval;

        if interval.is_none() {
            tracing::info!("background sync unavailable; syncing on connectivity changes only");
        }

        let handle = tokio::spawn(async move {
            attempt(&sync, "start").await;

            let Some(every) = interval else {
                return;
            };
            tracing::info!(every_secs = every.as_secs(), "background sync scheduled");

            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                attempt(&sync, "interval").await;
            }
        });

        if let Some(previous) = self.lock().replace(handle) {
            previous.abort();
        }
    }

    /// The host is in the foreground again.
    pub async fn on_resume(&self) -> crate::error::Result<SyncOutcome> {
        tracing::debug!("host resumed");
        self.sync.sync().await
    }

    /// Stop the periodic loop.
    pub fn stop(&self) {
        if let Some(handle) = self.lock().take() {
            handle.abort();
            tracing::debug!("background sync stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock().as_ref().is_some_and(|h| !h.is_finished())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for BackgroundRefresh {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn attempt(sync: &SyncOrchestrator, trigger: &'static str) {
    match sync.sync().await {
        Ok(outcome) => tracing::debug!(trigger, ?outcome, "background sync attempt"),
        Err(e) => tracing::warn!(trigger, error = %e, "background sync failed"),
    }
}
