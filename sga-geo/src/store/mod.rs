//! Persisted key-value storage for caches.
//!
//! The [`KeyValueStore`] trait is a small string-to-string interface, the
//! shape of browser `localStorage` or mobile `AsyncStorage`. Values are
//! JSON text; callers own their serialization.
//!
//! # Providers
//!
//! - [`FileStore`]: one file per key under a directory, atomic writes
//! - [`MemoryStore`]: process-local map, for tests or when persistence is off
//!
//! Stores are an optimization for the caches built on top of them. Those
//! caches log and swallow every [`StoreError`].

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use thiserror::Error;

use crate::BoxFuture;

/// Longest key accepted by [`validate_key`].
pub const MAX_KEY_LEN: usize = 200;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error reading or writing the backing medium.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored value could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Key is empty, too long, or contains characters outside `[A-Za-z0-9._-]`.
    #[error("Invalid key: {0:?}")]
    InvalidKey(String),
}

/// Generic persisted key-value interface.
///
/// Dyn-compatible so caches can hold `Arc<dyn KeyValueStore>`.
pub trait KeyValueStore: Send + Sync {
    /// Reads a value. `Ok(None)` if the key does not exist.
    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<String>, StoreError>>;

    /// Writes a value, replacing any previous one.
    fn set(&self, key: &str, value: String) -> BoxFuture<'_, Result<(), StoreError>>;

    /// Deletes a value. Returns whether it existed.
    fn remove(&self, key: &str) -> BoxFuture<'_, Result<bool, StoreError>>;

    /// Lists every key currently stored.
    fn keys(&self) -> BoxFuture<'_, Result<Vec<String>, StoreError>>;

    /// Deletes several keys, returning how many existed.
    fn remove_many<'a>(&'a self, keys: &'a [String]) -> BoxFuture<'a, Result<usize, StoreError>> {
        Box::pin(async move {
            let mut removed = 0;
            for key in keys {
                if self.remove(key).await? {
                    removed += 1;
                }
            }
            Ok(removed)
        })
    }
}

/// Checks that a key is safe to use as a file name on every platform.
pub fn validate_key(key: &str) -> Result<(), StoreError> {
    let valid_chars = key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if key.is_empty() || key.len() > MAX_KEY_LEN || key.starts_with('.') || !valid_chars {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}
