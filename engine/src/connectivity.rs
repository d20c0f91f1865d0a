//! Connectivity monitor.
//!
//! Tracks whether the host believes it is online and publishes `ONLINE` /
//! `OFFLINE` exactly once per transition. Listeners that need to react to a
//! transition (the auto-sync task) follow it through a `watch` channel.

use crate::{EventBus, SyncEvent};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Something that can tell whether the remote side is reachable.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn probe(&self) -> bool;
}

/// Process-wide online/offline state.
#[derive(Debug)]
pub struct ConnectivityMonitor {
    state: watch::Sender<bool>,
    bus: Arc<EventBus>,
}

impl ConnectivityMonitor {
    /// Create a monitor starting from the host's last known state.
    pub fn new(initially_online: bool, bus: Arc<EventBus>) -> Self {
        let (state, _) = watch::channel(initially_online);
        Self { state, bus }
    }

    pub fn is_online(&self) -> bool {
        *self.state.borrow()
    }

    /// Feed a platform connectivity signal.
    ///
    /// Returns `true` when this changed the state. Repeating the current
    /// state is ignored and publishes nothing.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.state.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });

        if changed {
            if online {
                tracing::info!("connectivity: online");
                self.bus.publish(SyncEvent::Online);
            } else {
                tracing::warn!("connectivity: offline");
                self.bus.publish(SyncEvent::Offline);
            }
        }

        changed
    }

    /// Follow state transitions.
    pub fn watch(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }

    /// Poll a probe on an interval and feed the result into the monitor.
    ///
    /// This stands in for platform online/offline events on hosts that have
    /// none.
    pub fn spawn_probe(
        self: &Arc<Self>,
        probe: Arc<dyn ConnectivityProbe>,
        every: Duration,
    ) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let reachable = probe.probe().await;
                tracing::trace!(reachable, "connectivity probe");
                monitor.set_online(reachable);
            }
        })
    }
}
