//! De-duplication markers for surfaced payment outcomes.

use marketstall_core::OrderId;

use crate::storage::{KeyValueStore, StorageError, keys, load_typed, save_typed};

/// Markers kept per session. Older orders fall off first.
pub const MAX_PAYMENT_MARKERS: usize = 50;

/// Order ids whose payment outcome was already shown, newest first.
///
/// Lives in session storage and is never written to durable storage: a
/// payment redirect is a single-visit event. Only the newest
/// [`MAX_PAYMENT_MARKERS`] are kept; a provider link for an evicted order
/// would notify again.
#[derive(Debug, Clone)]
pub struct PaymentMarkers<S> {
    store: S,
}

impl<S: KeyValueStore> PaymentMarkers<S> {
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    async fn load(&self) -> Result<Vec<OrderId>, StorageError> {
        let mut markers: Vec<OrderId> = load_typed(&self.store, keys::PAYMENT_MARKERS)
            .await?
            .unwrap_or_default();
        markers.truncate(MAX_PAYMENT_MARKERS);
        Ok(markers)
    }

    /// Whether the outcome for `order_id` was already surfaced.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    pub async fn contains(&self, order_id: OrderId) -> Result<bool, StorageError> {
        Ok(self.load().await?.contains(&order_id))
    }

    /// Write and flush the marker. Returns `false` if it already existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    pub async fn insert(&self, order_id: OrderId) -> Result<bool, StorageError> {
        let mut markers = self.load().await?;
        if markers.contains(&order_id) {
            return Ok(false);
        }
        markers.insert(0, order_id);
        markers.truncate(MAX_PAYMENT_MARKERS);
        save_typed(&self.store, keys::PAYMENT_MARKERS, &markers).await?;
        self.store.flush().await?;
        Ok(true)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[tokio::test]
    async fn test_insert_is_idempotent() {
        let markers = PaymentMarkers::new(MemoryStore::new());
        let id = OrderId::new(42);

        assert!(!markers.contains(id).await.unwrap());
        assert!(markers.insert(id).await.unwrap());
        assert!(!markers.insert(id).await.unwrap());
        assert!(markers.contains(id).await.unwrap());
        assert!(!markers.contains(OrderId::new(43)).await.unwrap());
    }

    #[tokio::test]
    async fn test_markers_are_per_order_newest_first() {
        let store = MemoryStore::new();
        let markers = PaymentMarkers::new(store.clone());
        markers.insert(OrderId::new(7)).await.unwrap();
        markers.insert(OrderId::new(3)).await.unwrap();

        assert_eq!(
            store.peek(keys::PAYMENT_MARKERS),
            Some(serde_json::json!([3, 7]))
        );
    }

    #[tokio::test]
    async fn test_insert_flushes() {
        let store = MemoryStore::new();
        let markers = PaymentMarkers::new(store.clone());

        markers.insert(OrderId::new(5)).await.unwrap();

        assert_eq!(
            store.peek_flushed(keys::PAYMENT_MARKERS),
            Some(Some(serde_json::json!([5])))
        );
    }

    #[tokio::test]
    async fn test_oldest_marker_is_evicted() {
        let store = MemoryStore::new();
        let markers = PaymentMarkers::new(store.clone());
        let count = i64::try_from(MAX_PAYMENT_MARKERS).unwrap();
        for id in 1..=count + 1 {
            assert!(markers.insert(OrderId::new(id)).await.unwrap());
        }

        let stored = store.peek(keys::PAYMENT_MARKERS).unwrap();
        assert_eq!(stored.as_array().unwrap().len(), MAX_PAYMENT_MARKERS);
        assert!(!markers.contains(OrderId::new(1)).await.unwrap());
        assert!(markers.contains(OrderId::new(2)).await.unwrap());
        assert!(markers.contains(OrderId::new(count + 1)).await.unwrap());
    }

    #[tokio::test]
    async fn test_oversized_stored_set_is_trimmed_on_read() {
        let store = MemoryStore::new();
        let ids: Vec<i64> = (0..100).collect();
        store
            .save(keys::PAYMENT_MARKERS, serde_json::json!(ids))
            .await
            .unwrap();
        let markers = PaymentMarkers::new(store.clone());

        assert!(markers.contains(OrderId::new(0)).await.unwrap());
        assert!(!markers.contains(OrderId::new(99)).await.unwrap());
    }
}
