//! Marketstall storefront library.
//!
//! Keeps an anonymous shopper's cart consistent across reloads, merges it
//! into the server cart once on sign-in, drives a URL-addressable checkout
//! and reconciles payment redirects exactly once. Exposed as a library so
//! the router can be exercised in-process by the integration tests.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod checkout;
pub mod config;
pub mod error;
pub mod flash;
pub mod gate;
pub mod gateway;
pub mod middleware;
pub mod payment;
pub mod routes;
pub mod state;
pub mod storage;

use axum::{
    Router,
    extract::Request,
    middleware::{from_fn, from_fn_with_state},
    routing::get,
};
use tower_http::trace::TraceLayer;

use state::AppState;

/// Build the full application router.
///
/// Layer order matters: the route gate reads the session, so the session
/// layer wraps it. The fallback sits inside the gate so unrouted paths are
/// still locale-normalized.
pub fn app(state: AppState) -> Router {
    let session_layer = middleware::create_session_layer(state.config());

    Router::new()
        .route("/health", get(health))
        .merge(routes::routes())
        .fallback(not_found)
        .layer(from_fn_with_state(
            state.clone(),
            middleware::route_gate_middleware,
        ))
        .layer(session_layer)
        .layer(from_fn(middleware::security_headers_middleware))
        .layer(from_fn(middleware::request_id_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
            tracing::info_span!(
                "request",
                method = %request.method(),
                path = %request.uri().path(),
                request_id = tracing::field::Empty,
            )
        }))
        .with_state(state)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check the back-end.
async fn health() -> &'static str {
    "ok"
}

async fn not_found() -> error::AppError {
    error::AppError::NotFound("page".to_string())
}
