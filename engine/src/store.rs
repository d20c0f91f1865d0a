//! Persistent store seam for queued actions.
//!
//! [`ActionStore`] is the key-indexed durable store the queue runs on. Every
//! method is atomic with respect to the backend: a transition is a single
//! read-modify-write, so interleaved callers cannot lose updates.

use crate::{
    error::Result, ActionStatus, Error, PendingAction, QueueSnapshot, Timestamp, Transition,
};
use async_trait::async_trait;
use tokio::sync::Mutex;

/// A durable, key-indexed store of pending actions with a status index.
#[async_trait]
pub trait ActionStore: Send + Sync {
    /// Insert a new action, assigning its insertion sequence.
    ///
    /// Fails with [`Error::DuplicateAction`] if the id is already present.
    async fn insert(&self, action: PendingAction) -> Result<PendingAction>;

    /// Fetch one action by id.
    async fn get(&self, id: &str) -> Result<Option<PendingAction>>;

    /// List actions, optionally filtered by status, in FIFO order
    /// (`created_at`, then `seq`).
    async fn list(&self, status: Option<ActionStatus>) -> Result<Vec<PendingAction>>;

    /// Atomically apply a status transition.
    ///
    /// Returns `None` if the action does not exist.
    async fn transition(
        &self,
        id: &str,
        transition: Transition,
        now: Timestamp,
    ) -> Result<Option<PendingAction>>;

    /// Remove an action. Returns whether it existed.
    async fn remove(&self, id: &str) -> Result<bool>;

    /// Remove every action with the given status. Returns how many were removed.
    async fn remove_by_status(&self, status: ActionStatus) -> Result<usize>;
}

impl QueueSnapshot {
    pub(crate) fn insert_action(&mut self, mut action: PendingAction) -> Result<PendingAction> {
        if self.actions.contains_key(&action.id) {
            return Err(Error::DuplicateAction(action.id));
        }
        action.seq = self.next_seq;
        self.next_seq += 1;
        self.actions.insert(action.id.clone(), action.clone());
        Ok(action)
    }

    /// Returns the updated action and whether anything changed.
    pub(crate) fn transition_action(
        &mut self,
        id: &str,
        transition: Transition,
        now: Timestamp,
    ) -> Result<Option<(PendingAction, bool)>> {
        let Some(action) = self.actions.get_mut(id) else {
            return Ok(None);
        };
        let changed = action.apply(transition, now)?;
        Ok(Some((action.clone(), changed)))
    }

    pub(crate) fn list_actions(&self, status: Option<ActionStatus>) -> Vec<PendingAction> {
        let mut actions: Vec<PendingAction> = self
            .actions
            .values()
            .filter(|a| status.map_or(true, |s| a.status == s))
            .cloned()
            .collect();
        actions.sort_by_key(PendingAction::order_key);
        actions
    }

    pub(crate) fn remove_status(&mut self, status: ActionStatus) -> usize {
        let before = self.actions.len();
        self.actions.retain(|_, a| a.status != status);
        before - self.actions.len()
    }
}

/// In-process store. Contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<QueueSnapshot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store from an existing snapshot.
    pub fn from_snapshot(snapshot: QueueSnapshot) -> Self {
        Self {
            state: Mutex::new(snapshot),
        }
    }

    /// Copy of the current contents.
    pub async fn snapshot(&self) -> QueueSnapshot {
        self.state.lock().await.clone()
    }
}

#[async_trait]
impl ActionStore for MemoryStore {
    async fn insert(&self, action: PendingAction) -> Result<PendingAction> {
        self.state.lock().await.insert_action(action)
    }

    async fn get(&self, id: &str) -> Result<Option<PendingAction>> {
        Ok(self.state.lock().await.actions.get(id).cloned())
    }

    async fn list(&self, status: Option<ActionStatus>) -> Result<Vec<PendingAction>> {
        Ok(self.state.lock().await.list_actions(status))
    }

    async fn transition(
        &self,
        id: &str,
        transition: Transition,
        now: Timestamp,
    ) -> Result<Option<PendingAction>> {
        let mut state = self.state.lock().await;
        Ok(state
            .transition_action(id, transition, now)?
            .map(|(action, _)| action))
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        Ok(self.state.lock().await.actions.remove(id).is_some())
    }

    async fn remove_by_status(&self, status: ActionStatus) -> Result<usize> {
        Ok(self.state.lock().await.remove_status(status))
    }
}
