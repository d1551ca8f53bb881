//! Cross-instance synchronisation
//!
//! Several store instances may share one durable backend (one per open
//! session). Each listens for storage events from other writers and replaces
//! its whole list with the written value. Last writer wins; nothing merges.

use async_trait::async_trait;
use common::StateStore;
use std::sync::Arc;
use telemetry::metrics::{STORAGE_FAILURES, STORAGE_SYNC_RELOADS};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::persistence::Decoded;

/// A store whose list mirrors one storage key
#[async_trait]
pub trait SyncTarget: Send + Sync + 'static {
    fn storage_key(&self) -> &'static str;
    fn origin(&self) -> Uuid;
    fn state(&self) -> &Arc<dyn StateStore>;

    /// Replace the list with a value written elsewhere; `None` means the key
    /// was removed. Returns whether the list changed.
    async fn apply_external(&self, new_value: Option<&str>) -> bool;

    /// Re-read the key, e.g. when the application regains focus. An absent
    /// key keeps the current list.
    async fn refresh_from_storage(&self) -> bool {
        let key = self.storage_key();
        match self.state().get(key).await {
            Ok(Some(raw)) => {
                let replaced = self.apply_external(Some(&raw)).await;
                if replaced {
                    STORAGE_SYNC_RELOADS.with_label_values(&[key, "refresh"]).inc();
                    debug!(key = %key, "store refreshed from storage");
                }
                replaced
            }
            Ok(None) => false,
            Err(e) => {
                warn!(key = %key, error = %e, "failed to refresh from storage");
                STORAGE_FAILURES.with_label_values(&[key, "read"]).inc();
                false
            }
        }
    }
}

pub(crate) fn apply_decoded<T>(list: &mut Vec<T>, decoded: Decoded<T>, key: &str) -> bool {
    match decoded {
        Decoded::Records(records) => {
            *list = records;
            true
        }
        Decoded::NotAList => {
            warn!(key = %key, "stored value is not a list, clearing");
            list.clear();
            true
        }
        Decoded::Malformed(e) => {
            error!(key = %key, error = %e, "failed to apply stored value");
            false
        }
        Decoded::Unreadable { skipped } => {
            error!(key = %key, skipped, "no stored record readable, keeping current list");
            false
        }
    }
}

/// Follow writes made by other instances until the task is aborted
///
/// The subscription is taken before this returns, so no write made after the
/// call is missed.
pub fn spawn_sync<T: SyncTarget>(target: Arc<T>) -> JoinHandle<()> {
    let mut events = target.state().subscribe();

    tokio::spawn(async move {
        let key = target.storage_key();
        loop {
            match events.recv().await {
                Ok(event) => {
                    if event.key != key || event.origin == target.origin() {
                        continue;
                    }
                    if target.apply_external(event.new_value.as_deref()).await {
                        STORAGE_SYNC_RELOADS.with_label_values(&[key, "event"]).inc();
                        info!(key = %key, origin = %event.origin, "store synchronised from another writer");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(key = %key, skipped, "sync listener lagged, reloading from storage");
                    target.refresh_from_storage().await;
                }
                Err(RecvError::Closed) => {
                    debug!(key = %key, "storage event channel closed");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert_store::{AlertStore, ALERTS_KEY};
    use crate::types::{Category, NewAlert, Urgency};
    use common::MemoryStateStore;
    use std::time::Duration;

    async fn eventually<F, Fut>(mut check: F) -> bool
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        for _ in 0..100 {
            if check().await {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    fn alert() -> NewAlert {
        NewAlert {
            title: "Falta de água".to_string(),
            description: "Sem água nos bebedouros".to_string(),
            location: "Cantina/Refeitório".to_string(),
            category: Category::Infrastructure,
            urgency: Urgency::Medium,
            created_by: "Administrador".to_string(),
        }
    }

    #[tokio::test]
    async fn test_other_instance_sees_write() {
        let state: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
        let first = Arc::new(AlertStore::open(state.clone()).await);
        let second = Arc::new(AlertStore::open(state.clone()).await);
        let handle = spawn_sync(second.clone());

        let added = first.add_alert(alert()).await.unwrap();
        let (observer, id) = (&second, added.id);

        assert!(eventually(move || async move { observer.get_alert(id).await.is_some() }).await);
        handle.abort();
    }

    #[tokio::test]
    async fn test_removed_key_clears_list() {
        let state: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
        let store = Arc::new(AlertStore::open(state.clone()).await);
        let handle = spawn_sync(store.clone());

        state.remove(ALERTS_KEY, Uuid::new_v4()).await.unwrap();
        let observer = &store;

        assert!(eventually(move || async move { observer.list_alerts().await.is_empty() }).await);
        handle.abort();
    }

    #[tokio::test]
    async fn test_malformed_external_value_is_ignored() {
        let state: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
        let store = AlertStore::open(state.clone()).await;

        assert!(!store.apply_external(Some("{not json")).await);
        assert_eq!(store.list_alerts().await.len(), 3);

        assert!(store.apply_external(Some("{\"a\":1}")).await);
        assert!(store.list_alerts().await.is_empty());
    }

    #[tokio::test]
    async fn test_refresh_keeps_list_when_key_absent() {
        let state: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
        let store = AlertStore::open(state.clone()).await;
        state.remove(ALERTS_KEY, Uuid::new_v4()).await.unwrap();

        assert!(!store.refresh_from_storage().await);
        assert_eq!(store.list_alerts().await.len(), 3);

        state.set(ALERTS_KEY, "[]", Uuid::new_v4()).await.unwrap();
        assert!(store.refresh_from_storage().await);
        assert!(store.list_alerts().await.is_empty());
    }
}
