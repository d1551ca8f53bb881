use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::state_store::{ChangeNotifier, StateStore, StorageEvent};
use crate::validation::validate_key;

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS kv_state (
        key TEXT PRIMARY KEY NOT NULL,
        value TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
"#;

const UPSERT: &str = r#"
    INSERT INTO kv_state (key, value, updated_at)
    VALUES (?1, ?2, ?3)
    ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
"#;

/// Embedded transactional key-value store on SQLite
pub struct SqliteStateStore {
    pool: SqlitePool,
    notifier: ChangeNotifier,
}

impl SqliteStateStore {
    /// Connect using a `sqlite:` URL, creating the database file if needed
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("invalid sqlite url: {}", database_url))?
            .create_if_missing(true);

        // Every connection to `:memory:` is a separate database; pin one.
        let in_memory = database_url.contains(":memory:");
        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 5 })
            .idle_timeout(if in_memory { None } else { Some(Duration::from_secs(600)) })
            .max_lifetime(if in_memory { None } else { Some(Duration::from_secs(1800)) })
            .connect_with(options)
            .await
            .context("Failed to connect to sqlite database")?;

        Self::with_pool(pool).await
    }

    /// Open (or create) a database file at `path`
    pub async fn open_file(path: impl AsRef<Path>) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open {}", path.as_ref().display()))?;

        Self::with_pool(pool).await
    }

    pub async fn with_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query(CREATE_TABLE)
            .execute(&pool)
            .await
            .context("Failed to create kv_state table")?;

        tracing::info!("sqlite state store ready");

        Ok(Self {
            pool,
            notifier: ChangeNotifier::new(),
        })
    }

    fn now() -> String {
        chrono::Utc::now().to_rfc3339()
    }
}

#[async_trait]
impl StateStore for SqliteStateStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        validate_key(key)?;
        let row = sqlx::query("SELECT value FROM kv_state WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("failed to read key {}", key))?;

        match row {
            Some(row) => Ok(Some(row.try_get::<String, _>("value")?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, origin: Uuid) -> Result<()> {
        validate_key(key)?;
        sqlx::query(UPSERT)
            .bind(key)
            .bind(value)
            .bind(Self::now())
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to write key {}", key))?;

        self.notifier.publish(key, Some(value), origin);
        Ok(())
    }

    async fn set_many(&self, entries: &[(String, String)], origin: Uuid) -> Result<()> {
        for (key, _) in entries {
            validate_key(key)?;
        }

        let updated_at = Self::now();
        let mut tx = self.pool.begin().await.context("failed to begin transaction")?;
        for (key, value) in entries {
            sqlx::query(UPSERT)
                .bind(key)
                .bind(value)
                .bind(&updated_at)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("failed to write key {}", key))?;
        }
        tx.commit().await.context("failed to commit transaction")?;

        for (key, value) in entries {
            self.notifier.publish(key, Some(value), origin);
        }
        Ok(())
    }

    async fn remove(&self, key: &str, origin: Uuid) -> Result<()> {
        validate_key(key)?;
        let result = sqlx::query("DELETE FROM kv_state WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to remove key {}", key))?;

        if result.rows_affected() > 0 {
            self.notifier.publish(key, None, origin);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.notifier.subscribe()
    }

    async fn health_check(&self) -> Result<bool> {
        match sqlx::query("SELECT 1").execute(&self.pool).await {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!(error = %e, "sqlite health check failed");
                Ok(false)
            }
        }
    }
}
