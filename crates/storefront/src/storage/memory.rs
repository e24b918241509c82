//! In-memory store used as the test double for session storage.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use super::{KeyValueStore, StorageError};

/// A `HashMap` behind a mutex. Clones share the same map.
///
/// [`KeyValueStore::flush`] copies the map aside so tests can tell what
/// was persisted early from what would only be written at the end of a
/// request.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: Arc<Mutex<HashMap<String, Value>>>,
    flushed: Arc<Mutex<Option<HashMap<String, Value>>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a raw value, for assertions.
    #[must_use]
    pub fn peek(&self, key: &str) -> Option<Value> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Raw value as of the last flush. `None` if never flushed.
    #[must_use]
    pub fn peek_flushed(&self, key: &str) -> Option<Option<Value>> {
        self.flushed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|values| values.get(key).cloned())
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn load(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.peek(key))
    }

    async fn save(&self, key: &str, value: Value) -> Result<(), StorageError> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), value);
        Ok(())
    }

    async fn clear(&self, key: &str) -> Result<(), StorageError> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }

    async fn flush(&self) -> Result<(), StorageError> {
        let snapshot = self
            .values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        *self.flushed.lock().unwrap_or_else(PoisonError::into_inner) = Some(snapshot);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::{load_typed, save_typed};

    #[tokio::test]
    async fn test_load_save_clear() {
        let store = MemoryStore::new();
        assert!(store.load("k").await.unwrap().is_none());

        save_typed(&store, "k", &vec![1, 2, 3]).await.unwrap();
        let loaded: Option<Vec<i32>> = load_typed(&store, "k").await.unwrap();
        assert_eq!(loaded, Some(vec![1, 2, 3]));

        store.clear("k").await.unwrap();
        assert!(store.peek("k").is_none());
    }

    #[tokio::test]
    async fn test_undecodable_value_is_absent() {
        let store = MemoryStore::new();
        store
            .save("k", serde_json::json!({"not": "a list"}))
            .await
            .unwrap();

        let loaded: Option<Vec<i32>> = load_typed(&store, "k").await.unwrap();
        assert_eq!(loaded, None);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let store = MemoryStore::new();
        let other = store.clone();
        store.save("k", Value::Bool(true)).await.unwrap();
        assert_eq!(other.peek("k"), Some(Value::Bool(true)));
    }

    #[tokio::test]
    async fn test_flush_snapshots_current_values() {
        let store = MemoryStore::new();
        store.save("k", Value::Bool(true)).await.unwrap();
        assert_eq!(store.peek_flushed("k"), None);

        store.flush().await.unwrap();
        store.clear("k").await.unwrap();

        assert_eq!(store.peek_flushed("k"), Some(Some(Value::Bool(true))));
        assert!(store.peek("k").is_none());
    }
}
