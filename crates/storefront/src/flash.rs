//! One-shot notifications carried across a redirect.
//!
//! A handler queues a [`Notice`] and redirects; the next render drains the
//! queue so each notice is shown exactly once.

use serde::{Deserialize, Serialize};

use crate::storage::{KeyValueStore, StorageError, keys, load_typed, save_typed};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Success,
    Error,
    Info,
}

/// A transient, non-blocking notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }
}

/// Queue a notice for the next render.
///
/// # Errors
///
/// Returns an error if the backing store fails.
pub async fn push<S: KeyValueStore + ?Sized>(store: &S, notice: Notice) -> Result<(), StorageError> {
    let mut queue: Vec<Notice> = load_typed(store, keys::FLASH).await?.unwrap_or_default();
    queue.push(notice);
    save_typed(store, keys::FLASH, &queue).await
}

/// Take every queued notice.
///
/// # Errors
///
/// Returns an error if the backing store fails.
pub async fn drain<S: KeyValueStore + ?Sized>(store: &S) -> Result<Vec<Notice>, StorageError> {
    let queue: Option<Vec<Notice>> = load_typed(store, keys::FLASH).await?;
    match queue {
        Some(queue) => {
            store.clear(keys::FLASH).await?;
            Ok(queue)
        }
        None => Ok(Vec::new()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[tokio::test]
    async fn test_drain_returns_each_notice_once() {
        let store = MemoryStore::new();
        push(&store, Notice::success("paid")).await.unwrap();
        push(&store, Notice::info("welcome")).await.unwrap();

        let notices = drain(&store).await.unwrap();
        assert_eq!(notices.len(), 2);
        assert_eq!(notices[0], Notice::success("paid"));
        assert!(drain(&store).await.unwrap().is_empty());
        assert_eq!(store.peek(keys::FLASH), None);
    }
}
