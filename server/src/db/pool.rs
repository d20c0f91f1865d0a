//! Postgres setup for the action store.

use std::time::Duration;

use sqlx::migrate::{MigrateError, Migrator};
use sqlx::postgres::PgPoolOptions;

use super::PgActionStore;

/// The agent serves a single local UI, so a handful of connections suffice.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Schema of the `pending_actions` table.
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Errors while bringing up the Postgres store.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("failed to connect to postgres: {0}")]
    Connect(#[from] sqlx::Error),

    #[error("failed to migrate pending_actions: {0}")]
    Migrate(#[from] MigrateError),
}

/// Connect, bring the queue schema up to date and wrap the pool in a store.
pub async fn connect_store(
    database_url: &str,
    max_connections: u32,
) -> Result<PgActionStore, SetupError> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(database_url)
        .await?;
    tracing::debug!(max_connections, "connected to postgres");

    MIGRATOR.run(&pool).await?;
    tracing::info!(migrations = MIGRATOR.iter().count(), "action store schema up to date");

    Ok(PgActionStore::new(pool))
}
