//! Per-session mutual exclusion.
//!
//! Requests from one browser run concurrently and each works on its own copy
//! of the session record. Read-modify-write sequences that call out to the
//! backend (the sign-in merge, payment markers) hold this lock so a second
//! request sees the first one's writes instead of repeating them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tower_sessions::session::Id;

/// Async locks keyed by session id. Clones share the same table.
#[derive(Debug, Clone, Default)]
pub struct SessionLocks {
    table: Arc<Mutex<HashMap<Id, Arc<AsyncMutex<()>>>>>,
}

impl SessionLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to the session `id`.
    pub async fn lock(&self, id: Id) -> OwnedMutexGuard<()> {
        let slot = {
            let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
            // Entries nobody holds or waits on.
            table.retain(|_, slot| Arc::strong_count(slot) > 1);
            Arc::clone(table.entry(id).or_default())
        };
        slot.lock_owned().await
    }

    /// Number of sessions with a holder or waiter.
    #[must_use]
    pub fn active(&self) -> usize {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|slot| Arc::strong_count(slot) > 1)
            .count()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_session_is_serialized() {
        let locks = SessionLocks::new();
        let id = Id::default();
        let inside = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks = (0..4).map(|_| {
            let locks = locks.clone();
            let inside = Arc::clone(&inside);
            let peak = Arc::clone(&peak);
            tokio::spawn(async move {
                let _guard = locks.lock(id).await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            })
        });
        for task in futures::future::join_all(tasks).await {
            task.unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_distinct_sessions_do_not_block() {
        let locks = SessionLocks::new();
        let _first = locks.lock(Id::default()).await;

        let second = tokio::time::timeout(Duration::from_secs(1), locks.lock(Id::default())).await;

        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn test_released_slots_are_pruned() {
        let locks = SessionLocks::new();
        let id = Id::default();
        {
            let _guard = locks.lock(id).await;
            assert_eq!(locks.active(), 1);
        }
        assert_eq!(locks.active(), 0);

        let _other = locks.lock(Id::default()).await;
        assert_eq!(locks.table.lock().unwrap().len(), 1);
    }
}
