//! Snapshot format used to persist the queue to a file.
//!
//! Snapshots use `BTreeMap` so the serialized form is deterministic, which
//! keeps rewrites of an unchanged queue byte-identical.

use crate::{error::Result, ActionId, Error, PendingAction};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Version of the snapshot format for future compatibility.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// A point-in-time copy of every queued action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSnapshot {
    /// Snapshot format version
    pub format_version: u32,
    /// Next insertion sequence to hand out
    pub next_seq: u64,
    /// All actions keyed by id
    pub actions: BTreeMap<ActionId, PendingAction>,
}

impl Default for QueueSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl QueueSnapshot {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            next_seq: 1,
            actions: BTreeMap::new(),
        }
    }

    /// Number of actions in the snapshot.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Check internal consistency after loading.
    pub fn validate(&self) -> Result<()> {
        for (key, action) in &self.actions {
            if key != &action.id {
                return Err(Error::InvalidSnapshot(format!(
                    "action keyed as '{}' has id '{}'",
                    key, action.id
                )));
            }
            if action.seq >= self.next_seq {
                return Err(Error::InvalidSnapshot(format!(
                    "action '{}' has seq {} but next seq is {}",
                    action.id, action.seq, self.next_seq
                )));
            }
        }
        Ok(())
    }

    /// Serialize to JSON with deterministic ordering.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Self =
            serde_json::from_str(json).map_err(|e| Error::InvalidSnapshot(e.to_string()))?;

        if snapshot.format_version > SNAPSHOT_FORMAT_VERSION {
            return Err(Error::InvalidSnapshot(format!(
                "unsupported snapshot format version: {} (max supported: {})",
                snapshot.format_version, SNAPSHOT_FORMAT_VERSION
            )));
        }

        snapshot.validate()?;
        Ok(snapshot)
    }
}
