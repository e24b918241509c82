//! Route authorization gate middleware.
//!
//! Must run inside the session layer so the session token is readable.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use super::auth::current_token;
use crate::gate::GateDecision;
use crate::state::AppState;

/// Apply the [`RouteGate`](crate::gate::RouteGate) decision to a request.
///
/// Locale normalization answers `307` so the method and body survive;
/// authorization redirects answer `303`. Admin requests that pass carry
/// the verified profile as a request extension.
pub async fn route_gate_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_owned();
    let query = request.uri().query().map(str::to_owned);

    let token = match request.extensions().get::<Session>() {
        Some(session) => current_token(session).await,
        None => None,
    };

    let decision = state
        .gate()
        .decide(&path, query.as_deref(), token.as_ref(), state.profiles())
        .await;

    match decision {
        GateDecision::Bypass | GateDecision::Allow(None) => next.run(request).await,
        GateDecision::Allow(Some(profile)) => {
            request.extensions_mut().insert(profile);
            next.run(request).await
        }
        GateDecision::LocaleRedirect(to) => Redirect::temporary(&to).into_response(),
        GateDecision::RedirectHome(to)
        | GateDecision::RedirectLogin(to)
        | GateDecision::AdminDenied(to) => {
            tracing::debug!(path = %path, to = %to, "Gate redirect");
            Redirect::to(&to).into_response()
        }
    }
}
