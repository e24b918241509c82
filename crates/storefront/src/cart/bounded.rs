//! Most-recent-first product lists with a fixed bound.
//!
//! Recently viewed and favorites each persist under their own key. The
//! newest entry is first; entries beyond the bound are dropped, not archived.
//! Favorites toggle synchronously with no server round-trip.

use marketstall_core::ProductId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::storage::{KeyValueStore, StorageError, load_typed, save_typed};

/// A product reference kept in a bounded list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEntry {
    pub product_id: ProductId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
}

/// A bounded MRU list persisted under `key`.
#[derive(Debug, Clone)]
pub struct BoundedList<S> {
    store: S,
    key: &'static str,
    limit: usize,
}

impl<S: KeyValueStore> BoundedList<S> {
    /// Create a list. A limit of zero is raised to one.
    pub fn new(store: S, key: &'static str, limit: usize) -> Self {
        Self {
            store,
            key,
            limit: limit.max(1),
        }
    }

    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    /// Entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    pub async fn entries(&self) -> Result<Vec<ListEntry>, StorageError> {
        let mut entries: Vec<ListEntry> = load_typed(&self.store, self.key)
            .await?
            .unwrap_or_default();
        // A lowered bound applies to lists written under the old one.
        entries.truncate(self.limit);
        Ok(entries)
    }

    /// Move or insert `entry` at the front, evicting the oldest beyond the bound.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    pub async fn push(&self, entry: ListEntry) -> Result<Vec<ListEntry>, StorageError> {
        let mut entries = self.entries().await?;
        entries.retain(|e| e.product_id != entry.product_id);
        entries.insert(0, entry);
        entries.truncate(self.limit);
        save_typed(&self.store, self.key, &entries).await?;
        Ok(entries)
    }

    /// Remove a product if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    pub async fn remove(&self, product_id: ProductId) -> Result<Vec<ListEntry>, StorageError> {
        let mut entries = self.entries().await?;
        let before = entries.len();
        entries.retain(|e| e.product_id != product_id);
        if entries.len() != before {
            save_typed(&self.store, self.key, &entries).await?;
        }
        Ok(entries)
    }

    /// Remove the product if present, otherwise push it.
    ///
    /// Returns `true` when the product is in the list afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    pub async fn toggle(&self, entry: ListEntry) -> Result<bool, StorageError> {
        if self.contains(entry.product_id).await? {
            self.remove(entry.product_id).await?;
            Ok(false)
        } else {
            self.push(entry).await?;
            Ok(true)
        }
    }

    /// Whether a product is in the list.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    pub async fn contains(&self, product_id: ProductId) -> Result<bool, StorageError> {
        Ok(self
            .entries()
            .await?
            .iter()
            .any(|e| e.product_id == product_id))
    }

    /// Empty the list.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    pub async fn clear(&self) -> Result<(), StorageError> {
        self.store.clear(self.key).await
    }
}
