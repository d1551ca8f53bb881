//! Storage double for failure-path tests

use anyhow::{bail, Result};
use async_trait::async_trait;
use common::{MemoryStateStore, StateStore, StorageEvent};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;
use uuid::Uuid;

/// In-memory store whose reads and writes can be switched to fail
#[derive(Default)]
pub(crate) struct FlakyStore {
    inner: MemoryStateStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl FlakyStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Stored value, bypassing the read switch
    pub(crate) async fn stored(&self, key: &str) -> Option<String> {
        self.inner.get(key).await.ok().flatten()
    }

    fn check_write(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("disk full");
        }
        Ok(())
    }
}

#[async_trait]
impl StateStore for FlakyStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            bail!("storage temporarily unavailable");
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, origin: Uuid) -> Result<()> {
        self.check_write()?;
        self.inner.set(key, value, origin).await
    }

    async fn set_many(&self, entries: &[(String, String)], origin: Uuid) -> Result<()> {
        self.check_write()?;
        self.inner.set_many(entries, origin).await
    }

    async fn remove(&self, key: &str, origin: Uuid) -> Result<()> {
        self.check_write()?;
        self.inner.remove(key, origin).await
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.inner.subscribe()
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(!self.fail_writes.load(Ordering::SeqCst))
    }
}
