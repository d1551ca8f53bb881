use anyhow::{Context, Result};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::{broadcast, Mutex};
use uuid::Uuid;

use crate::state_store::{ChangeNotifier, StateStore, StorageEvent};
use crate::validation::validate_key;

/// Directory-backed key-value store, one `<key>.json` file per key
///
/// Writes land in a temporary file first and are renamed into place, so a
/// reader never observes a half-written value. Change events are published
/// to subscribers in this process only.
pub struct FileStateStore {
    dir: PathBuf,
    notifier: ChangeNotifier,
    write_lock: Mutex<()>,
}

impl FileStateStore {
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("failed to create state directory {}", dir.display()))?;

        tracing::debug!(dir = %dir.display(), "file state store opened");

        Ok(Self {
            dir,
            notifier: ChangeNotifier::new(),
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{}.json", key)))
    }

    fn staging_path(path: &Path) -> PathBuf {
        path.with_extension("json.tmp")
    }

    async fn stage(path: &Path, value: &str) -> Result<PathBuf> {
        let staging = Self::staging_path(path);
        fs::write(&staging, value)
            .await
            .with_context(|| format!("failed to write {}", staging.display()))?;
        Ok(staging)
    }

    async fn commit(staging: &Path, path: &Path) -> Result<()> {
        fs::rename(staging, path)
            .await
            .with_context(|| format!("failed to move {} into place", path.display()))
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
        }
    }

    async fn set(&self, key: &str, value: &str, origin: Uuid) -> Result<()> {
        let path = self.path_for(key)?;
        {
            let _guard = self.write_lock.lock().await;
            let staging = Self::stage(&path, value).await?;
            Self::commit(&staging, &path).await?;
        }
        self.notifier.publish(key, Some(value), origin);
        Ok(())
    }

    async fn set_many(&self, entries: &[(String, String)], origin: Uuid) -> Result<()> {
        let paths = entries
            .iter()
            .map(|(key, _)| self.path_for(key))
            .collect::<Result<Vec<_>>>()?;

        {
            let _guard = self.write_lock.lock().await;

            // Stage everything before touching live files: a failed staging
            // write leaves every key at its previous value. Renames are not
            // atomic as a group; if one fails, keys renamed before it keep
            // their new value.
            let mut staged = Vec::with_capacity(entries.len());
            for (path, (_, value)) in paths.iter().zip(entries) {
                match Self::stage(path, value).await {
                    Ok(staging) => staged.push(staging),
                    Err(e) => {
                        for leftover in &staged {
                            let _ = fs::remove_file(leftover).await;
                        }
                        return Err(e);
                    }
                }
            }

            for (index, (staging, path)) in staged.iter().zip(&paths).enumerate() {
                if let Err(e) = Self::commit(staging, path).await {
                    tracing::warn!(
                        committed = index,
                        total = staged.len(),
                        error = %e,
                        "batch write interrupted, earlier keys already replaced"
                    );
                    for leftover in &staged[index..] {
                        let _ = fs::remove_file(leftover).await;
                    }
                    return Err(e);
                }
            }
        }

        for (key, value) in entries {
            self.notifier.publish(key, Some(value), origin);
        }
        Ok(())
    }

    async fn remove(&self, key: &str, origin: Uuid) -> Result<()> {
        let path = self.path_for(key)?;
        let _guard = self.write_lock.lock().await;
        match fs::remove_file(&path).await {
            Ok(()) => {
                self.notifier.publish(key, None, origin);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("failed to remove {}", path.display())),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.notifier.subscribe()
    }

    async fn health_check(&self) -> Result<bool> {
        match fs::metadata(&self.dir).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) => {
                tracing::warn!(dir = %self.dir.display(), error = %e, "state directory unavailable");
                Ok(false)
            }
        }
    }
}
