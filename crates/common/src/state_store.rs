use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

/// Buffered change events per subscriber before lagging receivers drop events
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Change notification published after a key is written or removed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageEvent {
    pub key: String,
    /// Serialized value after the change, `None` when the key was removed
    pub new_value: Option<String>,
    /// Identity of the writer that produced the change
    pub origin: Uuid,
}

/// Trait for durable key-value state storage
///
/// Values are opaque serialized text. Every successful write is announced to
/// subscribers, including the writer itself; consumers filter on `origin`.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str, origin: Uuid) -> Result<()>;

    /// Write several keys as one unit. Events are published only after every
    /// key has been written.
    async fn set_many(&self, entries: &[(String, String)], origin: Uuid) -> Result<()>;

    async fn remove(&self, key: &str, origin: Uuid) -> Result<()>;

    fn subscribe(&self) -> broadcast::Receiver<StorageEvent>;

    // Health check
    async fn health_check(&self) -> Result<bool>;
}

/// Fan-out of storage events shared by the backends
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    sender: broadcast::Sender<StorageEvent>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, key: &str, new_value: Option<&str>, origin: Uuid) {
        let event = StorageEvent {
            key: key.to_string(),
            new_value: new_value.map(str::to_string),
            origin,
        };
        // No subscribers is not an error
        if self.sender.send(event).is_err() {
            tracing::trace!(key = %key, "storage event dropped, no subscribers");
        }
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

/// In-process key-value store, used for tests and ephemeral sessions
#[derive(Default)]
pub struct MemoryStateStore {
    entries: RwLock<HashMap<String, String>>,
    notifier: ChangeNotifier,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str, origin: Uuid) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        self.notifier.publish(key, Some(value), origin);
        Ok(())
    }

    async fn set_many(&self, entries: &[(String, String)], origin: Uuid) -> Result<()> {
        {
            let mut guard = self.entries.write().await;
            for (key, value) in entries {
                guard.insert(key.clone(), value.clone());
            }
        }
        for (key, value) in entries {
            self.notifier.publish(key, Some(value), origin);
        }
        Ok(())
    }

    async fn remove(&self, key: &str, origin: Uuid) -> Result<()> {
        let removed = self.entries.write().await.remove(key);
        if removed.is_some() {
            self.notifier.publish(key, None, origin);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.notifier.subscribe()
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}
