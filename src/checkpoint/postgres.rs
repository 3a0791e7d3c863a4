//! PostgreSQL checkpoint store.
//!
//! Enable with the `postgres` feature flag.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use super::{CheckpointError, CheckpointResult, CheckpointStore, StorageResultExt};
use crate::conversation::{ConversationId, ExecutionState};

pub struct PostgresCheckpointStore {
    pool: Arc<PgPool>,
    table_name: String,
}

impl PostgresCheckpointStore {
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self::with_pool(Arc::new(pool)))
    }

    pub fn with_pool(pool: Arc<PgPool>) -> Self {
        Self {
            pool,
            table_name: "conversation_checkpoints".to_string(),
        }
    }

    pub fn with_table_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = name.into();
        self
    }

    /// Creates the checkpoint table and its indexes if they do not exist.
    pub async fn migrate(&self) -> Result<(), sqlx::Error> {
        let query = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id VARCHAR(255) PRIMARY KEY,
                version BIGINT NOT NULL,
                position VARCHAR(32) NOT NULL,
                data JSONB NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            CREATE INDEX IF NOT EXISTS idx_{table}_paused ON {table} (position, updated_at);
            "#,
            table = self.table_name
        );
        sqlx::raw_sql(&query).execute(&*self.pool).await?;
        Ok(())
    }

    async fn stored_version(&self, id: &ConversationId) -> CheckpointResult<Option<u64>> {
        let query = format!("SELECT version FROM {} WHERE id = $1", self.table_name);
        let row = sqlx::query(&query)
            .bind(id.as_str())
            .fetch_optional(&*self.pool)
            .await
            .storage_err()?;
        row.map(|r| r.try_get::<i64, _>("version").map(|v| v as u64))
            .transpose()
            .storage_err()
    }
}

#[async_trait]
impl CheckpointStore for PostgresCheckpointStore {
    fn name(&self) -> &str {
        "postgres"
    }

    async fn save(&self, state: &ExecutionState) -> CheckpointResult<()> {
        let data = serde_json::to_value(state)?;

        // The WHERE clause turns a non-increasing version into a no-op.
        let query = format!(
            r#"
            INSERT INTO {table} (id, version, position, data, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                version = EXCLUDED.version,
                position = EXCLUDED.position,
                data = EXCLUDED.data,
                updated_at = EXCLUDED.updated_at
            WHERE {table}.version < EXCLUDED.version
            "#,
            table = self.table_name
        );

        let result = sqlx::query(&query)
            .bind(state.conversation_id.as_str())
            .bind(state.version as i64)
            .bind(state.position.label())
            .bind(&data)
            .bind(state.updated_at)
            .execute(&*self.pool)
            .await
            .storage_err()?;

        if result.rows_affected() == 0 {
            let stored = self.stored_version(&state.conversation_id).await?;
            return Err(CheckpointError::VersionConflict {
                conversation_id: state.conversation_id.to_string(),
                stored: stored.unwrap_or_default(),
                incoming: state.version,
            });
        }
        Ok(())
    }

    async fn load(&self, id: &ConversationId) -> CheckpointResult<Option<ExecutionState>> {
        let query = format!("SELECT data FROM {} WHERE id = $1", self.table_name);
        let row = sqlx::query(&query)
            .bind(id.as_str())
            .fetch_optional(&*self.pool)
            .await
            .storage_err()?;

        match row {
            Some(row) => {
                let data: serde_json::Value = row.try_get("data").storage_err()?;
                Ok(Some(serde_json::from_value(data)?))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, id: &ConversationId) -> CheckpointResult<bool> {
        let query = format!("DELETE FROM {} WHERE id = $1", self.table_name);
        let result = sqlx::query(&query)
            .bind(id.as_str())
            .execute(&*self.pool)
            .await
            .storage_err()?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self) -> CheckpointResult<Vec<ConversationId>> {
        let query = format!("SELECT id FROM {} ORDER BY updated_at", self.table_name);
        let rows = sqlx::query(&query)
            .fetch_all(&*self.pool)
            .await
            .storage_err()?;
        rows.iter()
            .map(|r| r.try_get::<String, _>("id").map(ConversationId::from))
            .collect::<Result<Vec<_>, _>>()
            .storage_err()
    }

    async fn list_paused_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> CheckpointResult<Vec<ConversationId>> {
        let query = format!(
            "SELECT id FROM {} WHERE position = 'paused_before_sensitive' AND updated_at < $1",
            self.table_name
        );
        let rows = sqlx::query(&query)
            .bind(cutoff)
            .fetch_all(&*self.pool)
            .await
            .storage_err()?;
        rows.iter()
            .map(|r| r.try_get::<String, _>("id").map(ConversationId::from))
            .collect::<Result<Vec<_>, _>>()
            .storage_err()
    }
}
