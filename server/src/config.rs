//! Configuration management for the server.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use sweep_engine::{SyncOptions, DEFAULT_SYNC_INTERVAL};

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Base URL of the hosted REST API
    pub remote_url: String,
    /// Project API key sent as the `apikey` header
    pub remote_api_key: Option<String>,
    /// Bearer token used until a UI session token has been seen
    pub service_token: Option<String>,
    /// PostgreSQL connection URL; the file store is used when unset
    pub database_url: Option<String>,
    /// Size of the Postgres connection pool
    pub database_max_connections: u32,
    /// Queue file for the file store
    pub queue_path: PathBuf,
    /// Background sync period; `None` disables periodic sync
    pub sync_interval: Option<Duration>,
    /// Connectivity probe period; `None` disables probing
    pub probe_interval: Option<Duration>,
    /// Refuse manual retries after this many failures
    pub max_retries: Option<u32>,
    /// Remove synced actions after each run
    pub purge_synced: bool,
    /// Connectivity state assumed at startup
    pub start_online: bool,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let remote_url = env::var("REMOTE_URL").map_err(|_| ConfigError::MissingRemoteUrl)?;

        let sync_interval = match parse_var::<u64>("SYNC_INTERVAL_SECS")? {
            None => Some(DEFAULT_SYNC_INTERVAL),
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
        };

        let probe_interval = parse_var::<u64>("PROBE_INTERVAL_SECS")?
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        Ok(Self {
            host,
            port,
            remote_url,
            remote_api_key: non_empty_var("REMOTE_API_KEY"),
            service_token: non_empty_var("SERVICE_TOKEN"),
            database_url: non_empty_var("DATABASE_URL"),
            database_max_connections: parse_var("DATABASE_MAX_CONNECTIONS")?
                .unwrap_or(crate::db::DEFAULT_MAX_CONNECTIONS),
            queue_path: env::var("QUEUE_PATH")
                .unwrap_or_else(|_| "sweep-queue.json".to_string())
                .into(),
            sync_interval,
            probe_interval,
            max_retries: parse_var("MAX_RETRIES")?,
            purge_synced: parse_var("PURGE_SYNCED")?.unwrap_or(false),
            start_online: parse_var("START_ONLINE")?.unwrap_or(true),
        })
    }

    /// Engine tuning derived from this configuration.
    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            max_retries: self.max_retries,
            purge_synced: self.purge_synced,
            ..SyncOptions::default()
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match non_empty_var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
        None => Ok(None),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("REMOTE_URL environment variable is required")]
    MissingRemoteUrl,

    #[error("Invalid PORT value")]
    InvalidPort,

    #[error("Invalid {name} value: {value}")]
    Invalid { name: &'static str, value: String },
}

#[cfg(test)]
impl Config {
    /// Configuration for in-process tests: memory store, no timers.
    pub fn for_tests() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            remote_url: "https://api.example.test/rest/v1".into(),
            remote_api_key: None,
            service_token: None,
            database_url: None,
            database_max_connections: 1,
            queue_path: "sweep-queue.json".into(),
            sync_interval: None,
            probe_interval: None,
            max_retries: None,
            purge_synced: false,
            start_online: true,
        }
    }
}
