//! # Sweep Engine
//!
//! An offline action queue and sync engine for field apps that must keep
//! working without a network connection.
//!
//! Every mutation the UI makes is first written to a durable queue as a
//! [`PendingAction`], then delivered to the remote API when connectivity
//! allows. Delivery happens in FIFO order, one run at a time, and each
//! action's outcome is recorded on the action itself so a single failure
//! never blocks the rest of the queue.
//!
//! ## Components
//!
//! - [`ActionQueue`] over an [`ActionStore`] ([`MemoryStore`], [`FileStore`])
//!   holds the queued actions and their [`ActionStatus`].
//! - [`ConnectivityMonitor`] tracks online/offline transitions, fed by the
//!   host or by a [`ConnectivityProbe`].
//! - [`EventBus`] delivers [`SyncEvent`]s synchronously to UI observers.
//! - [`SyncOrchestrator`] drains the queue through a [`RemoteApi`]
//!   ([`HttpRemote`] for PostgREST-style backends).
//! - [`BackgroundRefresh`] runs periodic sync attempts.
//! - [`SyncRuntime`] wires all of the above and owns the spawned tasks.
//!
//! ## Status lifecycle
//!
//! ```text
//! pending ──BeginSync──> syncing ──Synced──> synced
//!    ^                      │
//!    └──Requeue── error <───┘ Failed
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sweep_engine::{ActionKind, FileStore, HttpRemote, SessionToken, SyncRuntime};
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(FileStore::open("sweep-queue.json").await?);
//! let tokens = Arc::new(SessionToken::new(Some("service-token".into())));
//! let remote = Arc::new(HttpRemote::new("https://api.example.com/rest/v1", None, tokens)?);
//!
//! let runtime = SyncRuntime::builder(store, remote).build();
//! runtime.start().await?;
//!
//! let _sub = runtime.bus().subscribe(|event| println!("{}", event.kind()));
//! runtime
//!     .submit("tasks", ActionKind::Update, json!({"id": "t-1", "done": true}), None)
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod action;
pub mod background;
pub mod clock;
pub mod connectivity;
pub mod error;
pub mod events;
pub mod file_store;
pub mod queue;
pub mod remote;
pub mod runtime;
pub mod snapshot;
pub mod store;
pub mod sync;

// Re-export main types at crate root
pub use action::{ActionKind, ActionStatus, PendingAction, Transition};
pub use background::{BackgroundRefresh, DEFAULT_SYNC_INTERVAL};
pub use clock::{Clock, ManualClock, SystemClock};
pub use connectivity::{ConnectivityMonitor, ConnectivityProbe};
pub use error::{DeliveryError, Error};
pub use events::{EventBus, Subscription, SyncEvent};
pub use file_store::FileStore;
pub use queue::{ActionQueue, QueueCounts};
pub use remote::{HttpRemote, RemoteApi, SessionToken, TokenProvider};
pub use runtime::{SyncRuntime, SyncRuntimeBuilder};
pub use snapshot::{QueueSnapshot, SNAPSHOT_FORMAT_VERSION};
pub use store::{ActionStore, MemoryStore};
pub use sync::{
    SkipReason, SyncOptions, SyncOrchestrator, SyncOutcome, SyncReport, SyncRun, SyncRunStatus,
    DEFAULT_STATUS_RESET_DELAY,
};

/// Type aliases for clarity
pub type ActionId = String;
pub type ResourceType = String;
/// Milliseconds since the Unix epoch
pub type Timestamp = u64;
