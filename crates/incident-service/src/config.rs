use anyhow::{bail, Context, Result};
use common::{FileStateStore, MemoryStateStore, SqliteStateStore, StateStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use std::{env, fmt};
use tracing::info;

use crate::submit::SubmitLatency;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    File,
    Sqlite,
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageBackend::Memory => write!(f, "memory"),
            StorageBackend::File => write!(f, "file"),
            StorageBackend::Sqlite => write!(f, "sqlite"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct IncidentConfig {
    pub backend: StorageBackend,
    pub storage_dir: PathBuf,
    pub database_url: Option<String>,
    pub ticket_latency_ms: u64,
    pub alert_latency_ms: u64,
}

impl IncidentConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any variable source; `from_env` passes the process environment
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let backend_str = lookup("STORAGE_BACKEND").unwrap_or_else(|| "file".to_string());
        let backend = match backend_str.to_lowercase().as_str() {
            "memory" => StorageBackend::Memory,
            "file" => StorageBackend::File,
            "sqlite" => StorageBackend::Sqlite,
            other => bail!("invalid STORAGE_BACKEND: {}", other),
        };

        let storage_dir = lookup("STORAGE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data"));

        let database_url = if backend == StorageBackend::Sqlite {
            Some(lookup("DATABASE_URL").context("DATABASE_URL required for sqlite storage")?)
        } else {
            lookup("DATABASE_URL")
        };

        let ticket_latency_ms = lookup("SUBMIT_LATENCY_MS")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(1500);

        let alert_latency_ms = lookup("ALERT_SUBMIT_LATENCY_MS")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(2000);

        Ok(Self {
            backend,
            storage_dir,
            database_url,
            ticket_latency_ms,
            alert_latency_ms,
        })
    }

    pub fn submit_latency(&self) -> SubmitLatency {
        SubmitLatency {
            ticket: Duration::from_millis(self.ticket_latency_ms),
            alert: Duration::from_millis(self.alert_latency_ms),
        }
    }

    pub async fn open_state_store(&self) -> Result<Arc<dyn StateStore>> {
        let store: Arc<dyn StateStore> = match self.backend {
            StorageBackend::Memory => Arc::new(MemoryStateStore::new()),
            StorageBackend::File => Arc::new(
                FileStateStore::open(self.storage_dir.clone())
                    .await
                    .with_context(|| format!("failed to open storage dir {}", self.storage_dir.display()))?,
            ),
            StorageBackend::Sqlite => {
                let url = self
                    .database_url
                    .as_deref()
                    .context("DATABASE_URL required for sqlite storage")?;
                Arc::new(
                    SqliteStateStore::connect(url)
                        .await
                        .context("failed to connect to sqlite database")?,
                )
            }
        };
        info!(backend = %self.backend, "state store opened");
        Ok(store)
    }
}
