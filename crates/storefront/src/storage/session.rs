//! Session-backed store.
//!
//! The shopper's `tower-sessions` session plays the role of browser
//! storage: it is keyed by the session cookie and owned by that browser.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::OwnedMutexGuard;
use tower_sessions::Session;

use super::{KeyValueStore, SessionLocks, StorageError};

/// [`KeyValueStore`] over a request's [`Session`].
#[derive(Debug, Clone)]
pub struct SessionStore {
    session: Session,
}

impl SessionStore {
    #[must_use]
    pub const fn new(session: Session) -> Self {
        Self { session }
    }

    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Take the session's lock and reload the record from the store.
    ///
    /// Whatever another request flushed while this one waited becomes
    /// visible. A record this request already modified is kept as is.
    /// Returns `None` for a session that was never persisted.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store fails.
    pub async fn lock_exclusive(
        &self,
        locks: &SessionLocks,
    ) -> Result<Option<OwnedMutexGuard<()>>, StorageError> {
        let Some(id) = self.session.id() else {
            return Ok(None);
        };
        let guard = locks.lock(id).await;
        if self.session.is_modified() {
            tracing::debug!("Session already modified, not reloading");
        } else {
            self.session.load().await?;
        }
        Ok(Some(guard))
    }
}

impl From<tower_sessions::session::Error> for StorageError {
    fn from(err: tower_sessions::session::Error) -> Self {
        Self::Backend(err.to_string())
    }
}

#[async_trait]
impl KeyValueStore for SessionStore {
    async fn load(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.session.get::<Value>(key).await?)
    }

    async fn save(&self, key: &str, value: Value) -> Result<(), StorageError> {
        self.session.insert(key, value).await?;
        Ok(())
    }

    async fn clear(&self, key: &str) -> Result<(), StorageError> {
        self.session.remove::<Value>(key).await?;
        Ok(())
    }

    async fn flush(&self) -> Result<(), StorageError> {
        self.session.save().await?;
        Ok(())
    }
}
