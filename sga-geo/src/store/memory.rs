//! In-process store backed by a concurrent map.

use dashmap::DashMap;

use super::{validate_key, KeyValueStore, StoreError};
use crate::BoxFuture;

/// Non-persistent [`KeyValueStore`].
///
/// Used when no cache directory is configured, and in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<String>, StoreError>> {
        let result = validate_key(key).map(|()| self.values.get(key).map(|v| v.value().clone()));
        Box::pin(async move { result })
    }

    fn set(&self, key: &str, value: String) -> BoxFuture<'_, Result<(), StoreError>> {
        let result = validate_key(key).map(|()| {
            self.values.insert(key.to_string(), value);
        });
        Box::pin(async move { result })
    }

    fn remove(&self, key: &str) -> BoxFuture<'_, Result<bool, StoreError>> {
        let result = validate_key(key).map(|()| self.values.remove(key).is_some());
        Box::pin(async move { result })
    }

    fn keys(&self) -> BoxFuture<'_, Result<Vec<String>, StoreError>> {
        let mut keys: Vec<String> = self.values.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        Box::pin(async move { Ok(keys) })
    }
}
