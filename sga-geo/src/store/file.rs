//! Directory-backed store: one `{key}.json` file per key.
//!
//! Writes go to a uniquely named temp file first and are renamed into
//! place, so a crash mid-write never leaves a truncated value behind.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use super::{validate_key, KeyValueStore, StoreError};
use crate::BoxFuture;

const VALUE_EXTENSION: &str = "json";

/// File-per-key persisted store.
#[derive(Debug)]
pub struct FileStore {
    directory: PathBuf,
    temp_counter: AtomicU64,
}

impl FileStore {
    /// Creates a store rooted at `directory`. The directory is created lazily
    /// on first write.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            temp_counter: AtomicU64::new(0),
        }
    }

    /// Creates the store and makes sure its directory exists.
    pub async fn open(directory: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = Self::new(directory);
        tokio::fs::create_dir_all(&store.directory).await?;
        Ok(store)
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn value_path(&self, key: &str) -> Result<PathBuf, StoreError> {
        validate_key(key)?;
        Ok(self
            .directory
            .join(format!("{}.{}", key, VALUE_EXTENSION)))
    }

    fn temp_path(&self, key: &str) -> PathBuf {
        let n = self.temp_counter.fetch_add(1, Ordering::Relaxed);
        self.directory
            .join(format!(".{}.{}.{}.tmp", key, std::process::id(), n))
    }

    async fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.value_path(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, key: &str, value: String) -> Result<(), StoreError> {
        let path = self.value_path(key)?;
        tokio::fs::create_dir_all(&self.directory).await?;

        let temp_path = self.temp_path(key);
        tokio::fs::write(&temp_path, value.as_bytes()).await?;
        if let Err(e) = tokio::fs::rename(&temp_path, &path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let path = self.value_path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut entries = match tokio::fs::read_dir(&self.directory).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(VALUE_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if validate_key(stem).is_ok() {
                    keys.push(stem.to_string());
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<String>, StoreError>> {
        let key = key.to_string();
        Box::pin(async move { self.read(&key).await })
    }

    fn set(&self, key: &str, value: String) -> BoxFuture<'_, Result<(), StoreError>> {
        let key = key.to_string();
        Box::pin(async move { self.write(&key, value).await })
    }

    fn remove(&self, key: &str) -> BoxFuture<'_, Result<bool, StoreError>> {
        let key = key.to_string();
        Box::pin(async move { self.delete(&key).await })
    }

    fn keys(&self) -> BoxFuture<'_, Result<Vec<String>, StoreError>> {
        Box::pin(self.list())
    }
}
