//! Database operations for the pending_actions table.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use sweep_engine::{
    error::Result, ActionKind, ActionStatus, ActionStore, Error, PendingAction, Timestamp,
    Transition,
};

const COLUMNS: &str = "id, seq, resource_type, operation, payload, created_at, updated_at, \
                       status, retry_count, last_error";

/// A stored action row from the database.
#[derive(Debug)]
pub struct StoredAction {
    pub id: String,
    pub seq: i64,
    pub resource_type: String,
    pub operation: String,
    pub payload: serde_json::Value,
    pub created_at: i64,
    pub updated_at: i64,
    pub status: String,
    pub retry_count: i32,
    pub last_error: Option<String>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredAction {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> std::result::Result<Self, sqlx::Error> {
        Ok(StoredAction {
            id: row.try_get("id")?,
            seq: row.try_get("seq")?,
            resource_type: row.try_get("resource_type")?,
            operation: row.try_get("operation")?,
            payload: row.try_get("payload")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            status: row.try_get("status")?,
            retry_count: row.try_get("retry_count")?,
            last_error: row.try_get("last_error")?,
        })
    }
}

impl StoredAction {
    /// Convert database row to an engine action.
    pub fn to_action(&self) -> Result<PendingAction> {
        let operation: ActionKind = self.operation.parse().map_err(Error::InvalidSnapshot)?;
        let status: ActionStatus = self.status.parse().map_err(Error::InvalidSnapshot)?;

        Ok(PendingAction {
            id: self.id.clone(),
            resource_type: self.resource_type.clone(),
            operation,
            payload: self.payload.clone(),
            created_at: self.created_at.max(0) as u64,
            updated_at: self.updated_at.max(0) as u64,
            status,
            retry_count: self.retry_count.max(0) as u32,
            last_error: self.last_error.clone(),
            seq: self.seq.max(0) as u64,
        })
    }
}

/// Action store persisted in PostgreSQL.
///
/// Transitions lock the row with `SELECT ... FOR UPDATE` so concurrent
/// agents sharing a database apply them one at a time.
#[derive(Debug, Clone)]
pub struct PgActionStore {
    pool: PgPool,
}

impl PgActionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn storage(err: sqlx::Error) -> Error {
    Error::storage(err)
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[async_trait]
impl ActionStore for PgActionStore {
    async fn insert(&self, action: PendingAction) -> Result<PendingAction> {
        let seq: Option<(i64,)> = sqlx::query_as(
            r#"
            INSERT INTO pending_actions (
                id, resource_type, operation, payload, created_at,
                updated_at, status, retry_count, last_error
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO NOTHING
            RETURNING seq
            "#,
        )
        .bind(&action.id)
        .bind(&action.resource_type)
        .bind(action.operation.as_str())
        .bind(&action.payload)
        .bind(to_i64(action.created_at))
        .bind(to_i64(action.updated_at))
        .bind(action.status.as_str())
        .bind(i32::try_from(action.retry_count).unwrap_or(i32::MAX))
        .bind(&action.last_error)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        match seq {
            Some((seq,)) => Ok(PendingAction {
                seq: seq.max(0) as u64,
                ..action
            }),
            None => Err(Error::DuplicateAction(action.id)),
        }
    }

    async fn get(&self, id: &str) -> Result<Option<PendingAction>> {
        let row = sqlx::query_as::<_, StoredAction>(&format!(
            "SELECT {} FROM pending_actions WHERE id = $1",
            COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        row.map(|r| r.to_action()).transpose()
    }

    async fn list(&self, status: Option<ActionStatus>) -> Result<Vec<PendingAction>> {
        let rows = sqlx::query_as::<_, StoredAction>(&format!(
            "SELECT {} FROM pending_actions \
             WHERE ($1::TEXT IS NULL OR status = $1) \
             ORDER BY created_at ASC, seq ASC",
            COLUMNS
        ))
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        rows.iter().map(StoredAction::to_action).collect()
    }

    async fn transition(
        &self,
        id: &str,
        transition: Transition,
        now: Timestamp,
    ) -> Result<Option<PendingAction>> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        let row = sqlx::query_as::<_, StoredAction>(&format!(
            "SELECT {} FROM pending_actions WHERE id = $1 FOR UPDATE",
            COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(storage)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut action = row.to_action()?;

        if action.apply(transition, now)? {
            sqlx::query(
                r#"
                UPDATE pending_actions
                SET status = $2, retry_count = $3, last_error = $4, updated_at = $5
                WHERE id = $1
                "#,
            )
            .bind(&action.id)
            .bind(action.status.as_str())
            .bind(i32::try_from(action.retry_count).unwrap_or(i32::MAX))
            .bind(&action.last_error)
            .bind(to_i64(action.updated_at))
            .execute(&mut *tx)
            .await
            .map_err(storage)?;
        }

        tx.commit().await.map_err(storage)?;
        Ok(Some(action))
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM pending_actions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove_by_status(&self, status: ActionStatus) -> Result<usize> {
        let result = sqlx::query("DELETE FROM pending_actions WHERE status = $1")
            .bind(status.as_str())
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        Ok(result.rows_affected() as usize)
    }
}
