use std::str::FromStr;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tokio::sync::Mutex;
use tracing::debug;

use crate::defs::CheckpointStore;

/// Process-local checkpoint. Fresh instances start with no checkpoint.
#[derive(Debug, Default)]
pub struct InMemoryCheckpointStore {
    last_seen_id: Mutex<Option<String>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_checkpoint(id: impl Into<String>) -> Self {
        Self {
            last_seen_id: Mutex::new(Some(id.into())),
        }
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn load(&self) -> Result<Option<String>> {
        Ok(self.last_seen_id.lock().await.clone())
    }

    async fn save(&self, id: &str) -> Result<()> {
        *self.last_seen_id.lock().await = Some(id.to_owned());
        Ok(())
    }
}

/// Checkpoint kept in a SQLite `checkpoints` table, one row per feed key.
pub struct SqliteCheckpointStore {
    pool: SqlitePool,
    key: String,
}

impl SqliteCheckpointStore {
    /// Opens (creating if needed) the database and ensures the schema exists.
    pub async fn connect(database_url: &str, key: impl Into<String>) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("invalid sqlite url: {database_url}"))?
            .create_if_missing(true);
        // One long-lived connection: in-memory databases are per-connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .context("failed to open checkpoint database")?;

        let store = Self {
            pool,
            key: key.into(),
        };
        store.setup_schema().await?;
        Ok(store)
    }

    async fn setup_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS checkpoints (
                feed_key TEXT PRIMARY KEY,
                last_seen_id TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn load(&self) -> Result<Option<String>> {
        let row = sqlx::query("SELECT last_seen_id FROM checkpoints WHERE feed_key = ?1")
            .bind(&self.key)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(row.try_get("last_seen_id")?)),
            None => Ok(None),
        }
    }

    async fn save(&self, id: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO checkpoints (feed_key, last_seen_id, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT (feed_key) DO UPDATE SET
                last_seen_id = excluded.last_seen_id,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&self.key)
        .bind(id)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!("Saved checkpoint {} for {}", id, self.key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_store_starts_empty_and_remembers_last_save() {
        let store = InMemoryCheckpointStore::new();
        assert_eq!(store.load().await.unwrap(), None);

        store.save("100").await.unwrap();
        store.save("105").await.unwrap();
        assert_eq!(store.load().await.unwrap().as_deref(), Some("105"));
    }

    #[tokio::test]
    async fn sqlite_store_round_trips_checkpoint() {
        let store = SqliteCheckpointStore::connect("sqlite::memory:", "timeline")
            .await
            .unwrap();
        assert_eq!(store.load().await.unwrap(), None);

        store.save("100").await.unwrap();
        store.save("105").await.unwrap();
        assert_eq!(store.load().await.unwrap().as_deref(), Some("105"));
    }

    #[tokio::test]
    async fn sqlite_store_keeps_keys_apart() {
        let store = SqliteCheckpointStore::connect("sqlite::memory:", "home")
            .await
            .unwrap();
        store.save("7").await.unwrap();

        let other = SqliteCheckpointStore {
            pool: store.pool.clone(),
            key: "lists".to_owned(),
        };
        assert_eq!(other.load().await.unwrap(), None);
        assert_eq!(store.load().await.unwrap().as_deref(), Some("7"));
    }
}
