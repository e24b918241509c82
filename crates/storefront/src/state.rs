//! Application state shared across handlers.

use std::sync::Arc;

use marketstall_core::StepSequence;

use crate::config::StorefrontConfig;
use crate::gate::RouteGate;
use crate::gateway::{BackendClient, GatewayError, OrderGateway, ProfileGateway, ServerCartGateway};
use crate::storage::SessionLocks;

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`. Back-end collaborators are held as trait
/// objects so tests can substitute fakes.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    profiles: Arc<dyn ProfileGateway>,
    server_cart: Arc<dyn ServerCartGateway>,
    orders: Arc<dyn OrderGateway>,
    gate: RouteGate,
    steps: StepSequence,
    session_locks: SessionLocks,
}

impl AppState {
    /// Create the application state backed by the HTTP back-end client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: StorefrontConfig) -> Result<Self, GatewayError> {
        let backend = Arc::new(BackendClient::new(&config.backend)?);
        Ok(Self::with_gateways(
            config,
            backend.clone(),
            backend.clone(),
            backend,
        ))
    }

    /// Create the application state with explicit collaborators.
    #[must_use]
    pub fn with_gateways(
        config: StorefrontConfig,
        profiles: Arc<dyn ProfileGateway>,
        server_cart: Arc<dyn ServerCartGateway>,
        orders: Arc<dyn OrderGateway>,
    ) -> Self {
        let gate = RouteGate::new(config.locales.clone());
        let steps = config.checkout.step_sequence();

        Self {
            inner: Arc::new(AppStateInner {
                config,
                profiles,
                server_cart,
                orders,
                gate,
                steps,
                session_locks: SessionLocks::new(),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn profiles(&self) -> &dyn ProfileGateway {
        self.inner.profiles.as_ref()
    }

    #[must_use]
    pub fn server_cart(&self) -> &dyn ServerCartGateway {
        self.inner.server_cart.as_ref()
    }

    #[must_use]
    pub fn orders(&self) -> &dyn OrderGateway {
        self.inner.orders.as_ref()
    }

    #[must_use]
    pub fn gate(&self) -> &RouteGate {
        &self.inner.gate
    }

    /// Per-session locks for merges and payment markers.
    #[must_use]
    pub fn session_locks(&self) -> &SessionLocks {
        &self.inner.session_locks
    }

    /// The configured checkout step sequence.
    #[must_use]
    pub fn step_sequence(&self) -> &StepSequence {
        &self.inner.steps
    }
}
