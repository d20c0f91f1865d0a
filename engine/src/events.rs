//! Event bus decoupling the queue and orchestrator from UI observers.
//!
//! Delivery is synchronous and in subscription order. A subscriber that
//! panics is logged and skipped; the remaining subscribers still run.

use crate::{ActionId, ActionKind, ResourceType};
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

/// Lifecycle events published by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum SyncEvent {
    Online,
    Offline,
    SyncStart,
    SyncComplete {
        success_count: usize,
        failure_count: usize,
    },
    SyncError {
        message: String,
    },
    ActionQueued {
        id: ActionId,
        resource_type: ResourceType,
        operation: ActionKind,
    },
    ActionSynced {
        id: ActionId,
    },
    ActionFailed {
        id: ActionId,
        error: String,
        retry_count: u32,
    },
    ActionDeleted {
        id: ActionId,
    },
}

impl SyncEvent {
    /// Wire name of the event type.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncEvent::Online => "ONLINE",
            SyncEvent::Offline => "OFFLINE",
            SyncEvent::SyncStart => "SYNC_START",
            SyncEvent::SyncComplete { .. } => "SYNC_COMPLETE",
            SyncEvent::SyncError { .. } => "SYNC_ERROR",
            SyncEvent::ActionQueued { .. } => "ACTION_QUEUED",
            SyncEvent::ActionSynced { .. } => "ACTION_SYNCED",
            SyncEvent::ActionFailed { .. } => "ACTION_FAILED",
            SyncEvent::ActionDeleted { .. } => "ACTION_DELETED",
        }
    }
}

type Callback = Arc<dyn Fn(&SyncEvent) + Send + Sync>;

#[derive(Default)]
struct Subscribers {
    next_id: AtomicU64,
    entries: RwLock<Vec<(u64, Callback)>>,
}

/// Synchronous publish/subscribe hub.
///
/// Cheap to share behind an `Arc`; subscriptions hold only a weak reference
/// back to the bus.
#[derive(Default)]
pub struct EventBus {
    inner: Arc<Subscribers>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a bus wrapped in `Arc` for sharing.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register a callback invoked for every published event.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&SyncEvent) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(callback)));

        Subscription {
            id,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver an event to every current subscriber.
    ///
    /// The subscriber list is copied before delivery, so callbacks may
    /// subscribe or unsubscribe without deadlocking.
    pub fn publish(&self, event: SyncEvent) {
        let subscribers: Vec<(u64, Callback)> = self
            .inner
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        tracing::trace!(event = event.kind(), subscribers = subscribers.len(), "publish");

        for (id, callback) in subscribers {
            if catch_unwind(AssertUnwindSafe(|| callback(&event))).is_err() {
                tracing::error!(
                    subscriber = id,
                    event = event.kind(),
                    "event subscriber panicked"
                );
            }
        }
    }

    /// Number of active subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Handle returned by [`EventBus::subscribe`].
///
/// Dropping the handle keeps the subscription alive; call
/// [`Subscription::unsubscribe`] to remove it.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    bus: Weak<Subscribers>,
}

impl Subscription {
    /// Remove the callback from the bus. Safe to call after the bus is gone.
    pub fn unsubscribe(self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.entries
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|(id, _)| *id != self.id);
        }
    }
}
