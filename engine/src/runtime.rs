//! Composition root for the engine.
//!
//! `SyncRuntime` wires the queue, event bus, connectivity monitor,
//! orchestrator and background trigger around an injected store, remote API
//! and clock, and owns the tasks that drive syncing.

use crate::{
    error::Result, ActionId, ActionKind, ActionQueue, ActionStore, BackgroundRefresh, Clock,
    ConnectivityMonitor, ConnectivityProbe, EventBus, RemoteApi, SyncOptions, SyncOrchestrator,
    SystemClock, DEFAULT_SYNC_INTERVAL,
};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Builder for [`SyncRuntime`].
pub struct SyncRuntimeBuilder {
    store: Arc<dyn ActionStore>,
    remote: Arc<dyn RemoteApi>,
    clock: Arc<dyn Clock>,
    options: SyncOptions,
    online: bool,
    sync_interval: Option<Duration>,
    probe: Option<(Arc<dyn ConnectivityProbe>, Duration)>,
}

impl SyncRuntimeBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    /// Connectivity state at startup.
    pub fn online(mut self, online: bool) -> Self {
        self.online = online;
        self
    }

    /// Period of the background loop; `None` disables it.
    pub fn sync_interval(mut self, interval: Option<Duration>) -> Self {
        self.sync_interval = interval;
        self
    }

    /// Poll `probe` every `every` to detect connectivity changes.
    pub fn probe(mut self, probe: Arc<dyn ConnectivityProbe>, every: Duration) -> Self {
        self.probe = Some((probe, every));
        self
    }

    pub fn build(self) -> SyncRuntime {
        let bus = EventBus::new_shared();
        let queue = ActionQueue::new(self.store, self.clock.clone(), bus.clone());
        let connectivity = Arc::new(ConnectivityMonitor::new(self.online, bus.clone()));
        let sync = Arc::new(SyncOrchestrator::new(
            queue.clone(),
            self.remote,
            connectivity.clone(),
            bus.clone(),
            self.clock,
            self.options,
        ));
        let background = BackgroundRefresh::new(sync.clone(), self.sync_interval);

        SyncRuntime {
            bus,
            queue,
            connectivity,
            sync,
            background,
            probe: self.probe,
            tasks: Mutex::new(Vec::new()),
        }
    }
}

/// A running sync engine.
pub struct SyncRuntime {
    bus: Arc<EventBus>,
    queue: ActionQueue,
    connectivity: Arc<ConnectivityMonitor>,
    sync: Arc<SyncOrchestrator>,
    background: BackgroundRefresh,
    probe: Option<(Arc<dyn ConnectivityProbe>, Duration)>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for SyncRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncRuntime")
            .field("online", &self.connectivity.is_online())
            .field("sync", &self.sync)
            .finish_non_exhaustive()
    }
}

impl SyncRuntime {
    /// Start building a runtime. Defaults: system clock, online, default
    /// options, 30 minute background interval, no probe.
    pub fn builder(store: Arc<dyn ActionStore>, remote: Arc<dyn RemoteApi>) -> SyncRuntimeBuilder {
        SyncRuntimeBuilder {
            store,
            remote,
            clock: Arc::new(SystemClock),
            options: SyncOptions::default(),
            online: true,
            sync_interval: Some(DEFAULT_SYNC_INTERVAL),
            probe: None,
        }
    }

    /// Recover interrupted actions and spawn the driving tasks.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn start(&self) -> Result<()> {
        let recovered = self.queue.recover_interrupted().await?;

        {
            let mut tasks = self.tasks();
            tasks.push(self.spawn_auto_sync());
            if let Some((probe, every)) = &self.probe {
                tasks.push(self.connectivity.spawn_probe(probe.clone(), *every));
            }
        }
        self.background.start();

        tracing::info!(
            recovered,
            online = self.connectivity.is_online(),
            background = ?self.background.interval(),
            "sync runtime started"
        );
        Ok(())
    }

    /// Sync whenever connectivity comes back.
    fn spawn_auto_sync(&self) -> JoinHandle<()> {
        let mut rx = self.connectivity.watch();
        let sync = Arc::clone(&self.sync);

        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let online = *rx.borrow_and_update();
                if !online {
                    continue;
                }
                tracing::debug!("back online, syncing");
                if let Err(e) = sync.sync().await {
                    tracing::warn!(error = %e, "sync after reconnect failed");
                }
            }
        })
    }

    /// Queue an action and, when online, start a sync without waiting for it.
    pub async fn submit(
        &self,
        resource_type: impl Into<String>,
        operation: ActionKind,
        payload: serde_json::Value,
        id: Option<ActionId>,
    ) -> Result<ActionId> {
        let id = self.queue.enqueue(resource_type, operation, payload, id).await?;

        if self.connectivity.is_online() {
            let sync = Arc::clone(&self.sync);
            tokio::spawn(async move {
                if let Err(e) = sync.sync().await {
                    tracing::warn!(error = %e, "sync after submit failed");
                }
            });
        }

        Ok(id)
    }

    /// Abort every task started by [`SyncRuntime::start`].
    pub fn shutdown(&self) {
        self.background.stop();
        for task in self.tasks().drain(..) {
            task.abort();
        }
        tracing::info!("sync runtime stopped");
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn queue(&self) -> &ActionQueue {
        &self.queue
    }

    pub fn connectivity(&self) -> &Arc<ConnectivityMonitor> {
        &self.connectivity
    }

    pub fn orchestrator(&self) -> &Arc<SyncOrchestrator> {
        &self.sync
    }

    pub fn background(&self) -> &BackgroundRefresh {
        &self.background
    }

    fn tasks(&self) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for SyncRuntime {
    fn drop(&mut self) {
        for task in self.tasks().drain(..) {
            task.abort();
        }
    }
}
