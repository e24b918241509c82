//! Client-owned cart state and cart synchronization.
//!
//! - [`LocalCartStore`] - the anonymous shopper's cart, persisted under one key
//! - [`BoundedList`] - recently viewed and favorites lists with MRU eviction
//! - [`CartSyncCoordinator`] - merges the local cart into the server cart
//!   exactly once per identity transition

mod bounded;
mod local;
mod sync;

pub use bounded::{BoundedList, ListEntry};
pub use local::LocalCartStore;
pub use sync::{ActiveCart, CartSyncCoordinator, CartSyncError, MergeOutcome, ProfilePresence};
