//! File-backed action store.
//!
//! The whole queue is kept in memory and rewritten to a JSON snapshot on
//! every mutation. Writes go to a temporary file which is fsynced and then
//! renamed over the real one, so a crash leaves either the old or the new
//! queue on disk, never a torn file.

use crate::{
    error::Result, ActionStatus, ActionStore, Error, PendingAction, QueueSnapshot, Timestamp,
    Transition,
};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Durable store persisting the queue as a JSON snapshot file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    state: Mutex<QueueSnapshot>,
}

impl FileStore {
    /// Open the store at `path`, loading the existing queue if the file exists.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let snapshot = match tokio::fs::read_to_string(&path).await {
            Ok(json) if json.trim().is_empty() => QueueSnapshot::new(),
            Ok(json) => QueueSnapshot::from_json(&json)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => QueueSnapshot::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(
            path = %path.display(),
            actions = snapshot.len(),
            "opened queue file"
        );

        Ok(Self {
            path,
            state: Mutex::new(snapshot),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, snapshot: &QueueSnapshot) -> Result<()> {
        let json = snapshot.to_json()?;
        let tmp = self.path.with_extension("tmp");

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(json.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Apply `mutate` to a copy of the state and commit it only once the copy
    /// has been written to disk.
    async fn commit<T>(
        &self,
        mutate: impl FnOnce(&mut QueueSnapshot) -> Result<(T, bool)>,
    ) -> Result<T> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        let (value, dirty) = mutate(&mut next)?;
        if dirty {
            self.persist(&next).await.map_err(|e| match e {
                Error::Storage(msg) => Error::Storage(format!(
                    "failed to write {}: {}",
                    self.path.display(),
                    msg
                )),
                other => other,
            })?;
            *state = next;
        }
        Ok(value)
    }
}

#[async_trait]
impl ActionStore for FileStore {
    async fn insert(&self, action: PendingAction) -> Result<PendingAction> {
        self.commit(|state| Ok((state.insert_action(action)?, true)))
            .await
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
        self.commit(|state| match state.transition_action(id, transition, now)? {
            Some((action, changed)) => Ok((Some(action), changed)),
            None => Ok((None, false)),
        })
        .await
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        self.commit(|state| {
            let removed = state.actions.remove(id).is_some();
            Ok((removed, removed))
        })
        .await
    }

    async fn remove_by_status(&self, status: ActionStatus) -> Result<usize> {
        self.commit(|state| {
            let removed = state.remove_status(status);
            Ok((removed, removed > 0))
        })
        .await
    }
}
