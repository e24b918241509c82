//! Key-value persistence port for client-owned state.
//!
//! The local cart, the bounded lists and the payment markers all persist
//! through [`KeyValueStore`]. Production code backs it with the shopper's
//! HTTP session ([`SessionStore`]); tests use [`MemoryStore`].
//!
//! Values are JSON. Typed access goes through [`load_typed`] and
//! [`save_typed`], which treat an undecodable value as absent so a
//! corrupted entry never blocks the shopper.

mod locks;
mod memory;
mod session;

pub use locks::SessionLocks;
pub use memory::MemoryStore;
pub use session::SessionStore;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use thiserror::Error;

/// Fixed namespace keys.
pub mod keys {
    /// Cart lines of an anonymous shopper.
    pub const LOCAL_CART: &str = "local_cart";

    /// Most-recent-first list of viewed products.
    pub const RECENTLY_VIEWED: &str = "recently_viewed";

    /// Most-recent-first list of favorite products.
    pub const FAVORITES: &str = "favorites";

    /// Order ids whose payment redirect was already surfaced.
    pub const PAYMENT_MARKERS: &str = "payment_markers";

    /// In-progress checkout state between in-page interactions.
    pub const CHECKOUT_SESSION: &str = "checkout_session";

    /// Session token handed over by the identity provider.
    pub const SESSION_TOKEN: &str = "session_token";

    /// Queued one-shot notifications.
    pub const FLASH: &str = "flash";
}

/// Errors raised by storage adapters.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backing store rejected the operation.
    #[error("storage backend error: {0}")]
    Backend(String),

    /// A value could not be encoded.
    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Persistence port with `load`/`save`/`clear` semantics.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Load the value stored under `key`.
    async fn load(&self, key: &str) -> Result<Option<Value>, StorageError>;

    /// Replace the value stored under `key`.
    async fn save(&self, key: &str, value: Value) -> Result<(), StorageError>;

    /// Remove the value stored under `key`.
    async fn clear(&self, key: &str) -> Result<(), StorageError>;

    /// Persist pending writes now rather than when the request completes.
    ///
    /// Stores that write through have nothing to do.
    async fn flush(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

/// Load and decode a typed value.
///
/// A value that no longer decodes (e.g. written by an older release) is
/// logged and treated as absent.
///
/// # Errors
///
/// Returns an error only if the backing store fails.
pub async fn load_typed<T, S>(store: &S, key: &str) -> Result<Option<T>, StorageError>
where
    T: DeserializeOwned,
    S: KeyValueStore + ?Sized,
{
    let Some(value) = store.load(key).await? else {
        return Ok(None);
    };

    match serde_json::from_value(value) {
        Ok(decoded) => Ok(Some(decoded)),
        Err(e) => {
            tracing::warn!(key, error = %e, "Discarding undecodable stored value");
            Ok(None)
        }
    }
}

/// Encode and save a typed value.
///
/// # Errors
///
/// Returns an error if encoding fails or the backing store fails.
pub async fn save_typed<T, S>(store: &S, key: &str, value: &T) -> Result<(), StorageError>
where
    T: Serialize + Sync,
    S: KeyValueStore + ?Sized,
{
    let value = serde_json::to_value(value)?;
    store.save(key, value).await
}
