//! Cart synchronization on identity transition.
//!
//! A [`CartSyncCoordinator`] lives for one mount of the authenticated shell
//! (one page request). [`CartSyncCoordinator::reconcile_on_auth`] checks
//! profile presence and, when the shopper is authenticated and the local cart
//! is non-empty, issues one add-line intent per local line. The back-end sums
//! quantities, so the merge is additive.
//!
//! Local lines are cleared only when every intent succeeded. On partial
//! failure exactly the failed lines stay local and the next mount retries
//! them. The cleared cart is flushed as soon as the intents settle, so a
//! response that later fails cannot bring merged lines back. A second call
//! on the same coordinator is a no-op.
//!
//! The coordinator does not serialize requests; callers holding one session
//! across concurrent requests take [`crate::storage::SessionLocks`] first.

use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::join_all;
use marketstall_core::{CartLines, CartSnapshot, Price, ProductId, Profile};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::OnceCell;

use super::LocalCartStore;
use crate::gateway::{GatewayError, ProfileGateway, ServerCartGateway, SessionToken};
use crate::storage::{KeyValueStore, StorageError};

/// Result of the profile-presence check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfilePresence {
    /// The token resolved to a profile.
    Authenticated(Profile),
    /// No token, or the token was rejected.
    Anonymous,
    /// The lookup failed for another reason. Treated like anonymous for this
    /// mount; nothing is merged and nothing is dropped.
    Unknown,
}

/// What a reconcile call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// This coordinator already ran.
    AlreadyRan,
    /// The shopper is not (known to be) authenticated.
    NotAuthenticated,
    /// Authenticated, but there was nothing local to merge.
    NothingToMerge,
    /// Intents were issued.
    Merged {
        merged: Vec<ProductId>,
        failed: Vec<ProductId>,
        snapshot: Option<CartSnapshot>,
    },
}

impl MergeOutcome {
    /// Products whose merge failed and remain in the local cart.
    #[must_use]
    pub fn failed(&self) -> &[ProductId] {
        match self {
            Self::Merged { failed, .. } => failed,
            _ => &[],
        }
    }
}

/// The cart a page should display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ActiveCart {
    Local { lines: CartLines },
    Server { snapshot: CartSnapshot },
}

impl ActiveCart {
    #[must_use]
    pub const fn lines(&self) -> &CartLines {
        match self {
            Self::Local { lines } => lines,
            Self::Server { snapshot } => &snapshot.lines,
        }
    }

    /// Badge number.
    #[must_use]
    pub fn total_quantity(&self) -> u32 {
        self.lines().total_quantity()
    }

    #[must_use]
    pub fn subtotal(&self) -> Price {
        match self {
            Self::Local { lines } => Price::new(lines.subtotal(), Default::default()),
            Self::Server { snapshot } => snapshot.subtotal(),
        }
    }

    #[must_use]
    pub const fn is_server(&self) -> bool {
        matches!(self, Self::Server { .. })
    }
}

/// Errors resolving the active cart.
#[derive(Debug, Error)]
pub enum CartSyncError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Mount-scoped merge coordinator.
pub struct CartSyncCoordinator<'a, S> {
    local: &'a LocalCartStore<S>,
    profiles: &'a dyn ProfileGateway,
    server_cart: &'a dyn ServerCartGateway,
    token: Option<&'a SessionToken>,
    presence: OnceCell<ProfilePresence>,
    fired: AtomicBool,
}

impl<'a, S: KeyValueStore> CartSyncCoordinator<'a, S> {
    /// Create a coordinator for one mount.
    pub fn new(
        local: &'a LocalCartStore<S>,
        profiles: &'a dyn ProfileGateway,
        server_cart: &'a dyn ServerCartGateway,
        token: Option<&'a SessionToken>,
    ) -> Self {
        Self {
            local,
            profiles,
            server_cart,
            token,
            presence: OnceCell::new(),
            fired: AtomicBool::new(false),
        }
    }

    /// Profile presence, looked up at most once per mount.
    pub async fn presence(&self) -> &ProfilePresence {
        self.presence
            .get_or_init(|| async {
                let Some(token) = self.token else {
                    return ProfilePresence::Anonymous;
                };
                match self.profiles.fetch_profile(token).await {
                    Ok(profile) => ProfilePresence::Authenticated(profile),
                    Err(GatewayError::Unauthorized) => ProfilePresence::Anonymous,
                    Err(e) => {
                        tracing::warn!(error = %e, "Profile lookup failed, skipping cart merge");
                        ProfilePresence::Unknown
                    }
                }
            })
            .await
    }

    /// Merge the local cart into the server cart, once per coordinator.
    ///
    /// # Errors
    ///
    /// Returns an error only if reading or updating the local cart fails.
    /// Gateway failures are per line and reported in the outcome.
    pub async fn reconcile_on_auth(&self) -> Result<MergeOutcome, StorageError> {
        if self.fired.swap(true, Ordering::SeqCst) {
            return Ok(MergeOutcome::AlreadyRan);
        }

        let (ProfilePresence::Authenticated(profile), Some(token)) =
            (self.presence().await, self.token)
        else {
            return Ok(MergeOutcome::NotAuthenticated);
        };

        let lines = self.local.lines().await?;
        if lines.is_empty() {
            return Ok(MergeOutcome::NothingToMerge);
        }

        tracing::info!(
            account_id = %profile.id,
            lines = lines.len(),
            "Merging local cart into server cart"
        );

        // Intents run concurrently; completion order between lines is not
        // guaranteed, only that all of them settle before the local cart changes.
        let results = join_all(lines.iter().map(|line| async move {
            let result = self
                .server_cart
                .add_line(token, line.product_id, line.quantity)
                .await;
            (line.product_id, result)
        }))
        .await;

        let mut merged = Vec::new();
        let mut failed = Vec::new();
        let mut last_snapshot = None;
        for (product_id, result) in results {
            match result {
                Ok(snapshot) => {
                    merged.push(product_id);
                    last_snapshot = Some(snapshot);
                }
                Err(e) => {
                    tracing::warn!(product_id = %product_id, error = %e, "Cart line merge failed");
                    failed.push(product_id);
                }
            }
        }

        if failed.is_empty() {
            self.local.clear().await?;
        } else {
            self.local.retain_only(&failed).await?;
        }
        self.local.flush().await?;

        // Responses may have arrived out of order; ask for the settled state.
        let snapshot = match self.server_cart.fetch_cart(token).await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to refresh server cart after merge");
                last_snapshot
            }
        };

        tracing::info!(
            merged = merged.len(),
            failed = failed.len(),
            "Cart merge finished"
        );

        Ok(MergeOutcome::Merged {
            merged,
            failed,
            snapshot,
        })
    }

    /// Reconcile, then resolve the cart the page should display.
    ///
    /// Once the shopper is authenticated the server cart is shown, including
    /// while failed lines wait locally for the next retry.
    ///
    /// # Errors
    ///
    /// Returns an error if local storage fails, or if the shopper is
    /// authenticated and the server cart cannot be fetched.
    pub async fn active_cart(&self) -> Result<(MergeOutcome, ActiveCart), CartSyncError> {
        let outcome = self.reconcile_on_auth().await?;

        let token = match (self.presence().await, self.token) {
            (ProfilePresence::Authenticated(_), Some(token)) => token,
            _ => {
                let lines = self.local.lines().await?;
                return Ok((outcome, ActiveCart::Local { lines }));
            }
        };

        let snapshot = match &outcome {
            MergeOutcome::Merged {
                snapshot: Some(snapshot),
                ..
            } => snapshot.clone(),
            _ => self.server_cart.fetch_cart(token).await?,
        };

        Ok((outcome, ActiveCart::Server { snapshot }))
    }
}
