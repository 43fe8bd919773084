use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::error::Result;
use crate::models::attempt::SessionCheckpoint;

/// Durable per-session progress snapshots, keyed by session id.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn save(&self, checkpoint: &SessionCheckpoint) -> Result<()>;
    async fn load(&self, session_id: Uuid) -> Result<Option<SessionCheckpoint>>;
    async fn clear(&self, session_id: Uuid) -> Result<()>;
}

#[derive(Clone)]
pub struct PgCheckpointStore {
    pool: PgPool,
}

impl PgCheckpointStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CheckpointStore for PgCheckpointStore {
    async fn save(&self, checkpoint: &SessionCheckpoint) -> Result<()> {
        let payload = serde_json::to_value(checkpoint)?;
        sqlx::query(
            r#"
            INSERT INTO session_checkpoints (session_id, payload, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (session_id) DO UPDATE SET payload = EXCLUDED.payload, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(checkpoint.session_id)
        .bind(payload)
        .bind(checkpoint.saved_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn load(&self, session_id: Uuid) -> Result<Option<SessionCheckpoint>> {
        let row = sqlx::query(r#"SELECT payload FROM session_checkpoints WHERE session_id = $1"#)
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => {
                let payload: serde_json::Value = row.try_get("payload")?;
                Ok(Some(serde_json::from_value(payload)?))
            }
            None => Ok(None),
        }
    }

    async fn clear(&self, session_id: Uuid) -> Result<()> {
        sqlx::query(r#"DELETE FROM session_checkpoints WHERE session_id = $1"#)
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryCheckpointStore {
    entries: Mutex<HashMap<Uuid, SessionCheckpoint>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn save(&self, checkpoint: &SessionCheckpoint) -> Result<()> {
        self.entries
            .lock()
            .expect("checkpoint store mutex poisoned")
            .insert(checkpoint.session_id, checkpoint.clone());
        Ok(())
    }

    async fn load(&self, session_id: Uuid) -> Result<Option<SessionCheckpoint>> {
        Ok(self
            .entries
            .lock()
            .expect("checkpoint store mutex poisoned")
            .get(&session_id)
            .cloned())
    }

    async fn clear(&self, session_id: Uuid) -> Result<()> {
        self.entries
            .lock()
            .expect("checkpoint store mutex poisoned")
            .remove(&session_id);
        Ok(())
    }
}
