//! The anonymous shopper's cart.
//!
//! This store is the only writer of [`keys::LOCAL_CART`]. Every mutation is
//! load-modify-save against the persistence port, so the persisted list is
//! always the source of truth across reloads.

use marketstall_core::{CartLine, CartLines, ProductId};

use crate::storage::{KeyValueStore, StorageError, keys, load_typed, save_typed};

/// Local cart over a [`KeyValueStore`].
#[derive(Debug, Clone)]
pub struct LocalCartStore<S> {
    store: S,
}

impl<S: KeyValueStore> LocalCartStore<S> {
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Current cart lines; empty if nothing was ever stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    pub async fn lines(&self) -> Result<CartLines, StorageError> {
        Ok(load_typed(&self.store, keys::LOCAL_CART)
            .await?
            .unwrap_or_default())
    }

    async fn persist(&self, lines: &CartLines) -> Result<(), StorageError> {
        if lines.is_empty() {
            self.store.clear(keys::LOCAL_CART).await
        } else {
            save_typed(&self.store, keys::LOCAL_CART, lines).await
        }
    }

    /// Add a line, summing with an existing line for the same product.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    pub async fn add(&self, line: CartLine) -> Result<CartLines, StorageError> {
        let mut lines = self.lines().await?;
        lines.add(line);
        self.persist(&lines).await?;
        Ok(lines)
    }

    /// Remove a product.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    pub async fn remove(&self, product_id: ProductId) -> Result<CartLines, StorageError> {
        let mut lines = self.lines().await?;
        if lines.remove(product_id) {
            self.persist(&lines).await?;
        }
        Ok(lines)
    }

    /// Set a product's quantity; zero removes the line.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    pub async fn set_quantity(
        &self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartLines, StorageError> {
        let mut lines = self.lines().await?;
        if lines.set_quantity(product_id, quantity) {
            self.persist(&lines).await?;
        }
        Ok(lines)
    }

    /// Add the line if absent, remove it if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    pub async fn toggle(&self, line: CartLine) -> Result<CartLines, StorageError> {
        let mut lines = self.lines().await?;
        lines.toggle(line);
        self.persist(&lines).await?;
        Ok(lines)
    }

    /// Keep only the given products. Used to retain failed merge lines.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    pub async fn retain_only(&self, product_ids: &[ProductId]) -> Result<CartLines, StorageError> {
        let mut lines = self.lines().await?;
        lines.retain_only(product_ids);
        self.persist(&lines).await?;
        Ok(lines)
    }

    /// Drop the whole cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    pub async fn clear(&self) -> Result<(), StorageError> {
        self.store.clear(keys::LOCAL_CART).await
    }

    /// Persist the cart now instead of when the request completes.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    pub async fn flush(&self) -> Result<(), StorageError> {
        self.store.flush().await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use marketstall_core::Quantity;
    use rust_decimal::Decimal;

    use super::*;
    use crate::storage::MemoryStore;

    fn line(id: i64, quantity: u32) -> CartLine {
        CartLine {
            product_id: ProductId::new(id),
            name: format!("Product {id}"),
            unit_price: Decimal::new(1_000, 2),
            quantity: Quantity::new(quantity).unwrap(),
            image_ref: Some(format!("/img/{id}.webp")),
        }
    }

    #[tokio::test]
    async fn test_cart_survives_new_store_handle() {
        let backing = MemoryStore::new();
        LocalCartStore::new(backing.clone()).add(line(1, 2)).await.unwrap();

        // A reload builds a fresh store over the same backing storage.
        let reloaded = LocalCartStore::new(backing);
        let lines = reloaded.lines().await.unwrap();
        assert_eq!(lines.total_quantity(), 2);
    }

    #[tokio::test]
    async fn test_zero_quantity_is_never_persisted() {
        let backing = MemoryStore::new();
        let cart = LocalCartStore::new(backing.clone());
        cart.add(line(1, 2)).await.unwrap();

        cart.set_quantity(ProductId::new(1), 0).await.unwrap();
        assert!(backing.peek(keys::LOCAL_CART).is_none());
    }

    #[tokio::test]
    async fn test_toggle_and_remove() {
        let cart = LocalCartStore::new(MemoryStore::new());
        cart.toggle(line(1, 1)).await.unwrap();
        cart.add(line(2, 3)).await.unwrap();

        let lines = cart.toggle(line(1, 1)).await.unwrap();
        assert!(!lines.contains(ProductId::new(1)));

        let lines = cart.remove(ProductId::new(2)).await.unwrap();
        assert!(lines.is_empty());
    }

    #[tokio::test]
    async fn test_retain_only() {
        let cart = LocalCartStore::new(MemoryStore::new());
        cart.add(line(1, 1)).await.unwrap();
        cart.add(line(2, 1)).await.unwrap();

        let lines = cart.retain_only(&[ProductId::new(2)]).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines.contains(ProductId::new(2)));
    }
}
