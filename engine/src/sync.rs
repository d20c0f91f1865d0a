//! Sync orchestrator.
//!
//! Drains the queue in FIFO order, delivering each pending action to the
//! remote API. At most one run is active at a time; a call made while a run
//! is in progress, or while offline, is skipped rather than queued.
//!
//! Per-action delivery failures are recorded on the action and the run moves
//! on. Structural failures (storage errors, connectivity lost mid-run) abort
//! the run and are reported as `SYNC_ERROR`.

use crate::{
    error::Result, ActionQueue, ActionStatus, Clock, ConnectivityMonitor, Error, EventBus,
    PendingAction, RemoteApi, SyncEvent, Timestamp,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Default time a finished run keeps reporting `complete` / `error`.
pub const DEFAULT_STATUS_RESET_DELAY: Duration = Duration::from_secs(3);

/// Tuning knobs for the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Refuse manual retries once an action has failed this many times.
    /// `None` means retries are never refused.
    pub max_retries: Option<u32>,
    /// Remove synced actions at the end of every successful run.
    pub purge_synced: bool,
    /// How long `complete` / `error` is shown before the status reads `idle`.
    pub status_reset_delay: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            max_retries: None,
            purge_synced: false,
            status_reset_delay: DEFAULT_STATUS_RESET_DELAY,
        }
    }
}

/// Why `sync()` did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
    Offline,
    AlreadyRunning,
}

/// Counts of a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub success_count: usize,
    pub failure_count: usize,
    /// Synced actions removed at the end of the run
    pub purged: usize,
}

/// Result of a `sync()` call that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum SyncOutcome {
    Completed(SyncReport),
    Skipped { reason: SkipReason },
}

impl SyncOutcome {
    pub fn report(&self) -> Option<&SyncReport> {
        match self {
            SyncOutcome::Completed(report) => Some(report),
            SyncOutcome::Skipped { .. } => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, SyncOutcome::Skipped { .. })
    }
}

/// Run status shown to the UI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncRunStatus {
    #[default]
    Idle,
    Syncing,
    Complete,
    Error,
}

/// State of the most recent run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRun {
    pub status: SyncRunStatus,
    pub last_sync_at: Option<Timestamp>,
    pub success_count: usize,
    pub failure_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

#[derive(Debug, Default)]
struct RunState {
    run: SyncRun,
    finished_at: Option<Timestamp>,
}

/// Releases the run flag on every exit path.
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// How one action's delivery attempt ended.
enum Attempt {
    Delivered,
    Failed,
    /// Deleted or changed by someone else since the run listed it.
    Gone,
}

/// Coordinates delivery of queued actions.
pub struct SyncOrchestrator {
    queue: ActionQueue,
    remote: Arc<dyn RemoteApi>,
    connectivity: Arc<ConnectivityMonitor>,
    bus: Arc<EventBus>,
    clock: Arc<dyn Clock>,
    options: SyncOptions,
    running: AtomicBool,
    state: Mutex<RunState>,
}

impl std::fmt::Debug for SyncOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncOrchestrator")
            .field("options", &self.options)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl SyncOrchestrator {
    pub fn new(
        queue: ActionQueue,
        remote: Arc<dyn RemoteApi>,
        connectivity: Arc<ConnectivityMonitor>,
        bus: Arc<EventBus>,
        clock: Arc<dyn Clock>,
        options: SyncOptions,
    ) -> Self {
        Self {
            queue,
            remote,
            connectivity,
            bus,
            clock,
            options,
            running: AtomicBool::new(false),
            state: Mutex::new(RunState::default()),
        }
    }

    pub fn queue(&self) -> &ActionQueue {
        &self.queue
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Whether a run is in progress.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Deliver every pending action, oldest first.
    pub async fn sync(&self) -> Result<SyncOutcome> {
        if !self.connectivity.is_online() {
            tracing::debug!("sync skipped: offline");
            return Ok(SyncOutcome::Skipped {
                reason: SkipReason::Offline,
            });
        }

        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("sync skipped: run already in progress");
            return Ok(SyncOutcome::Skipped {
                reason: SkipReason::AlreadyRunning,
            });
        }
        let _guard = RunGuard(&self.running);

        self.update_state(|state| {
            state.run.status = SyncRunStatus::Syncing;
            state.run.last_error = None;
            state.finished_at = None;
        });
        self.bus.publish(SyncEvent::SyncStart);

        match self.drain().await {
            Ok(report) => {
                let now = self.clock.now();
                self.update_state(|state| {
                    state.run = SyncRun {
                        status: SyncRunStatus::Complete,
                        last_sync_at: Some(now),
                        success_count: report.success_count,
                        failure_count: report.failure_count,
                        last_error: None,
                    };
                    state.finished_at = Some(now);
                });

                tracing::info!(
                    success = report.success_count,
                    failed = report.failure_count,
                    purged = report.purged,
                    "sync complete"
                );
                self.bus.publish(SyncEvent::SyncComplete {
                    success_count: report.success_count,
                    failure_count: report.failure_count,
                });
                Ok(SyncOutcome::Completed(report))
            }
            Err((report, err)) => {
                let message = err.to_string();
                let now = self.clock.now();
                self.update_state(|state| {
                    state.run.status = SyncRunStatus::Error;
                    state.run.success_count = report.success_count;
                    state.run.failure_count = report.failure_count;
                    state.run.last_error = Some(message.clone());
                    state.finished_at = Some(now);
                });

                tracing::error!(error = %message, "sync aborted");
                self.bus.publish(SyncEvent::SyncError {
                    message: message.clone(),
                });
                Err(match err {
                    Error::RunAborted(_) => err,
                    other => Error::RunAborted(other.to_string()),
                })
            }
        }
    }

    /// The body of a run. On abort, returns what was done so far.
    async fn drain(&self) -> std::result::Result<SyncReport, (SyncReport, Error)> {
        let mut report = SyncReport::default();

        let pending = self
            .queue
            .list_by_status(ActionStatus::Pending)
            .await
            .map_err(|e| (report, e))?;

        tracing::debug!(count = pending.len(), "sync started");

        for action in &pending {
            if !self.connectivity.is_online() {
                return Err((
                    report,
                    Error::RunAborted("connectivity lost during sync".to_string()),
                ));
            }

            match self.attempt(action).await {
                Ok(Attempt::Delivered) => report.success_count += 1,
                Ok(Attempt::Failed) => report.failure_count += 1,
                Ok(Attempt::Gone) => {}
                Err(e) => return Err((report, e)),
            }
        }

        if self.options.purge_synced {
            report.purged = self.queue.purge_synced().await.map_err(|e| (report, e))?;
        }

        Ok(report)
    }

    async fn attempt(&self, action: &PendingAction) -> Result<Attempt> {
        match self.queue.mark_syncing(&action.id).await {
            Ok(_) => {}
            Err(Error::ActionNotFound(_) | Error::InvalidTransition { .. }) => {
                tracing::debug!(id = %action.id, "action changed since listing, skipped");
                return Ok(Attempt::Gone);
            }
            Err(e) => return Err(e),
        }

        match self.remote.deliver(action).await {
            Ok(()) => {
                if let Err(e) = self.queue.mark_synced(&action.id).await {
                    self.release(&action.id).await;
                    return Err(e);
                }
                self.bus.publish(SyncEvent::ActionSynced {
                    id: action.id.clone(),
                });
                Ok(Attempt::Delivered)
            }
            Err(delivery) => {
                let reason = delivery.to_string();
                tracing::warn!(id = %action.id, error = %reason, "action delivery failed");

                match self.queue.mark_error(&action.id, reason.clone()).await {
                    Ok(failed) => {
                        self.bus.publish(SyncEvent::ActionFailed {
                            id: failed.id,
                            error: reason,
                            retry_count: failed.retry_count,
                        });
                        Ok(Attempt::Failed)
                    }
                    Err(Error::ActionNotFound(_)) => Ok(Attempt::Gone),
                    Err(e) => {
                        self.release(&action.id).await;
                        Err(e)
                    }
                }
            }
        }
    }

    /// Best-effort return of an action to `pending` after the run aborted
    /// while it was `syncing`.
    async fn release(&self, id: &str) {
        if let Err(e) = self.queue.mark_pending(id).await {
            tracing::warn!(id, error = %e, "could not requeue action; it is recovered on next start");
        }
    }

    /// Put a failed action back in line and start a run.
    pub async fn retry_action(&self, id: &str) -> Result<SyncOutcome> {
        let action = self
            .queue
            .get(id)
            .await?
            .ok_or_else(|| Error::ActionNotFound(id.to_string()))?;

        if action.status != ActionStatus::Error {
            return Err(Error::InvalidTransition {
                id: action.id,
                from: action.status,
                to: ActionStatus::Pending,
            });
        }

        if let Some(cap) = self.options.max_retries {
            if action.retry_count >= cap {
                tracing::warn!(id, retries = action.retry_count, "retry refused");
                return Err(Error::RetryLimitReached {
                    id: action.id,
                    retries: action.retry_count,
                });
            }
        }

        self.queue.mark_pending(id).await?;
        tracing::info!(id, retries = action.retry_count, "action requeued for retry");

        self.sync().await
    }

    /// Remove an action whatever its status.
    pub async fn delete_action(&self, id: &str) -> Result<bool> {
        let removed = self.queue.delete(id).await?;
        if removed {
            self.bus.publish(SyncEvent::ActionDeleted { id: id.to_string() });
        }
        Ok(removed)
    }

    /// Unsynced actions, oldest first.
    pub async fn list_pending_actions(&self) -> Result<Vec<PendingAction>> {
        self.queue.list_unsynced().await
    }

    /// Current run status.
    ///
    /// `complete` and `error` read as `idle` once the reset delay has passed.
    pub fn status(&self) -> SyncRun {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let mut run = state.run.clone();

        if let Some(finished) = state.finished_at {
            let delay =
                u64::try_from(self.options.status_reset_delay.as_millis()).unwrap_or(u64::MAX);
            if self.clock.now().saturating_sub(finished) >= delay {
                run.status = SyncRunStatus::Idle;
            }
        }
        run
    }

    fn update_state(&self, f: impl FnOnce(&mut RunState)) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state);
    }
}
