//! HTTP route handlers for the storefront.
//!
//! Every page lives under a locale prefix; the route gate adds one when it
//! is missing. Views are JSON documents. A `GET` is a page load (a mount of
//! that page); a `POST` is an in-page interaction.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                                - Liveness check
//! GET  /{locale}                              - Home
//!
//! # Cart
//! GET  /{locale}/cart                         - Cart page (runs the auth merge)
//! POST /{locale}/cart/lines                   - Add a line
//! POST /{locale}/cart/lines/{product_id}      - Set a line's quantity
//! POST /{locale}/cart/lines/{product_id}/remove - Remove a line
//! POST /{locale}/cart/toggle                  - Add if absent, remove if present
//!
//! # Lists
//! GET  /{locale}/favorites                    - Favorites
//! POST /{locale}/favorites/toggle             - Toggle a favorite
//! POST /{locale}/favorites/clear              - Clear favorites
//! GET  /{locale}/recently-viewed              - Recently viewed
//! POST /{locale}/recently-viewed              - Record a product view
//!
//! # Checkout (requires token)
//! GET  /{locale}/checkout?step=               - Mount: fresh session from the URL
//! GET  /{locale}/checkout/step?step=          - Step parameter changed
//! POST /{locale}/checkout/next                - Advance (proxies shipping submit)
//! POST /{locale}/checkout/shipping            - Submit shipping details
//! POST /{locale}/checkout/payment-method      - Choose a payment method
//! POST /{locale}/checkout/confirm             - Create the order
//!
//! # Orders and account (requires token)
//! GET  /{locale}/orders/{id}                  - Order detail, payment redirect target
//! GET  /{locale}/account                      - Account overview
//!
//! # Admin (requires admin role)
//! GET  /{locale}/admin                        - Admin landing
//!
//! # Auth
//! GET  /{locale}/login                        - Login page
//! GET  /{locale}/register                     - Register page
//! POST /{locale}/login/session                - Identity provider token handoff
//! POST /{locale}/logout                       - Clear the session token
//! ```

pub mod account;
pub mod admin;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod home;
pub mod lists;
pub mod orders;

use axum::{
    Router,
    routing::{get, post},
};
use marketstall_core::ProductId;

use crate::cart::{ActiveCart, CartSyncCoordinator, LocalCartStore};
use crate::error::Result;
use crate::gateway::SessionToken;
use crate::state::AppState;
use crate::storage::SessionStore;

/// The active cart for this mount, after the identity-transition merge.
pub struct ResolvedCart {
    pub cart: ActiveCart,
    /// Lines whose merge failed this mount; they stay local for a retry.
    pub pending_merge: Vec<ProductId>,
}

/// Run the mount-scoped cart merge and resolve which cart to show.
///
/// With a token the merge runs under the session's lock against a freshly
/// loaded record, so two page loads racing after sign-in merge once. Call
/// this before the handler writes to the session.
///
/// # Errors
///
/// Returns an error if session storage fails, or the server cart cannot be
/// fetched for an authenticated shopper.
pub async fn resolve_cart(
    state: &AppState,
    store: &SessionStore,
    token: Option<&SessionToken>,
) -> Result<ResolvedCart> {
    let _guard = match token {
        Some(_) => store.lock_exclusive(state.session_locks()).await?,
        None => None,
    };

    let local = LocalCartStore::new(store.clone());
    let coordinator =
        CartSyncCoordinator::new(&local, state.profiles(), state.server_cart(), token);
    let (outcome, cart) = coordinator.active_cart().await?;

    Ok(ResolvedCart {
        pending_merge: outcome.failed().to_vec(),
        cart,
    })
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/{locale}/cart", get(cart::show))
        .route("/{locale}/cart/lines", post(cart::add))
        .route("/{locale}/cart/lines/{product_id}", post(cart::update))
        .route("/{locale}/cart/lines/{product_id}/remove", post(cart::remove))
        .route("/{locale}/cart/toggle", post(cart::toggle))
}

/// Create the favorites and recently viewed routes router.
pub fn list_routes() -> Router<AppState> {
    Router::new()
        .route("/{locale}/favorites", get(lists::favorites_page))
        .route("/{locale}/favorites/toggle", post(lists::toggle_favorite))
        .route("/{locale}/favorites/clear", post(lists::clear_favorites))
        .route(
            "/{locale}/recently-viewed",
            get(lists::recently_viewed).post(lists::record_view),
        )
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/{locale}/checkout", get(checkout::mount))
        .route("/{locale}/checkout/step", get(checkout::step_changed))
        .route("/{locale}/checkout/next", post(checkout::next))
        .route("/{locale}/checkout/shipping", post(checkout::shipping))
        .route(
            "/{locale}/checkout/payment-method",
            post(checkout::payment_method),
        )
        .route("/{locale}/checkout/confirm", post(checkout::confirm))
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/{locale}/login", get(auth::login_page))
        .route("/{locale}/register", get(auth::register_page))
        .route("/{locale}/login/session", post(auth::establish_session))
        .route("/{locale}/logout", post(auth::logout))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/{locale}", get(home::home))
        .merge(cart_routes())
        .merge(list_routes())
        .merge(checkout_routes())
        .route("/{locale}/orders/{order_id}", get(orders::show))
        .route("/{locale}/account", get(account::index))
        .route("/{locale}/admin", get(admin::index))
        .merge(auth_routes())
}
