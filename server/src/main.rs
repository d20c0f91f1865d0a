//! Sweep Sync Agent - hosts the offline action queue for local UIs.
//!
//! The agent keeps every mutation the UI makes in a durable queue and delivers
//! it to the hosted REST API whenever connectivity allows. UIs talk to it over
//! HTTP and follow its events over a WebSocket.

mod auth;
mod config;
mod db;
mod error;
mod handlers;
mod routes;
mod websocket;

use crate::config::Config;
use crate::websocket::ConnectionManager;
use std::sync::Arc;
use sweep_engine::{
    ActionStore, FileStore, HttpRemote, SessionToken, Subscription, SyncRuntime,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<SyncRuntime>,
    pub config: Arc<Config>,
    pub conn_manager: Arc<ConnectionManager>,
    /// Bearer token forwarded to the remote API
    pub tokens: Arc<SessionToken>,
}

impl AppState {
    /// Wire a runtime to a fresh connection manager.
    ///
    /// The returned subscription forwards engine events to WebSocket clients.
    pub fn new(
        runtime: Arc<SyncRuntime>,
        config: Arc<Config>,
        tokens: Arc<SessionToken>,
    ) -> (Self, Subscription) {
        let conn_manager = ConnectionManager::new_shared();
        let subscription = conn_manager.attach(runtime.bus());
        (
            Self {
                runtime,
                config,
                conn_manager,
                tokens,
            },
            subscription,
        )
    }
}

/// Pick the queue backend from configuration.
async fn open_store(config: &Config) -> Result<Arc<dyn ActionStore>, Box<dyn std::error::Error>> {
    match &config.database_url {
        Some(url) => {
            let store = db::connect_store(url, config.database_max_connections).await?;
            tracing::info!("Using PostgreSQL action store");
            Ok(Arc::new(store))
        }
        None => {
            let store = FileStore::open(&config.queue_path).await?;
            tracing::info!(path = %config.queue_path.display(), "Using file action store");
            Ok(Arc::new(store))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "sweep_server=debug,sweep_engine=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!("Starting Sweep Sync Agent on {}:{}", config.host, config.port);

    let store = open_store(&config).await?;

    let tokens = Arc::new(SessionToken::new(config.service_token.clone()));
    let remote = Arc::new(HttpRemote::new(
        config.remote_url.clone(),
        config.remote_api_key.clone(),
        tokens.clone(),
    )?);

    let mut builder = SyncRuntime::builder(store, remote.clone())
        .options(config.sync_options())
        .online(config.start_online)
        .sync_interval(config.sync_interval);
    if let Some(every) = config.probe_interval {
        builder = builder.probe(remote, every);
    }
    let runtime = Arc::new(builder.build());

    let (state, _events) = AppState::new(runtime.clone(), Arc::new(config.clone()), tokens);
    runtime.start().await?;

    let app = routes::create_app(state);

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    runtime.shutdown();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
