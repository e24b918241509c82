//! Authentication route handlers.
//!
//! Credentials are issued by an external identity provider. The storefront
//! only renders the entry pages and accepts the token it hands back; the
//! cart merge happens on the next page load.

use axum::{
    Form, Json,
    extract::{Path, Query},
    response::Redirect,
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{AppError, Result, clear_sentry_user};
use crate::gateway::SessionToken;
use crate::middleware::{clear_session_token, set_session_token};
use crate::storage::{KeyValueStore, SessionStore, keys};

/// Query of the login and register pages.
#[derive(Debug, Deserialize)]
pub struct AuthQuery {
    pub next: Option<String>,
}

/// Login or register page view.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthPageView {
    pub locale: String,
    pub page: &'static str,
    /// Where the identity provider posts the session token.
    pub handoff_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}

/// Session token handed over by the identity provider.
#[derive(Debug, Deserialize)]
pub struct SessionHandoff {
    pub token: String,
    pub next: Option<String>,
}

fn auth_page(locale: String, page: &'static str, next: Option<String>) -> AuthPageView {
    AuthPageView {
        handoff_url: format!("/{locale}/login/session"),
        next: next.filter(|n| is_local_path(n)),
        locale,
        page,
    }
}

/// Display the login page.
#[instrument]
pub async fn login_page(
    Path(locale): Path<String>,
    Query(query): Query<AuthQuery>,
) -> Json<AuthPageView> {
    Json(auth_page(locale, "login", query.next))
}

/// Display the register page.
#[instrument]
pub async fn register_page(
    Path(locale): Path<String>,
    Query(query): Query<AuthQuery>,
) -> Json<AuthPageView> {
    Json(auth_page(locale, "register", query.next))
}

/// Store the session token and continue to `next` or home.
#[instrument(skip(session, handoff))]
pub async fn establish_session(
    Path(locale): Path<String>,
    session: Session,
    Form(handoff): Form<SessionHandoff>,
) -> Result<Redirect> {
    let token = SessionToken::new(handoff.token)
        .ok_or_else(|| AppError::BadRequest("missing session token".to_string()))?;

    set_session_token(&session, &token)
        .await
        .map_err(|e| AppError::Internal(format!("failed to store session token: {e}")))?;

    tracing::info!("Session established");

    let to = handoff
        .next
        .filter(|n| is_local_path(n))
        .unwrap_or_else(|| format!("/{locale}"));
    Ok(Redirect::to(&to))
}

/// Clear the session token and any checkout in progress.
///
/// The local cart is left alone; after logout it is the anonymous cart
/// again.
#[instrument(skip(session))]
pub async fn logout(Path(locale): Path<String>, session: Session) -> Result<Redirect> {
    clear_session_token(&session)
        .await
        .map_err(|e| AppError::Internal(format!("failed to clear session token: {e}")))?;
    SessionStore::new(session)
        .clear(keys::CHECKOUT_SESSION)
        .await?;
    clear_sentry_user();

    Ok(Redirect::to(&format!("/{locale}")))
}

/// Only same-origin absolute paths are valid redirect targets.
fn is_local_path(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//") && !path.contains('\\')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_local_path() {
        assert!(is_local_path("/en/checkout?step=cart"));
        assert!(!is_local_path("//evil.example/phish"));
        assert!(!is_local_path("https://evil.example"));
        assert!(!is_local_path("/\\evil.example"));
    }

    #[test]
    fn test_auth_page_drops_foreign_next() {
        let view = auth_page("en".into(), "login", Some("https://evil.example".into()));
        assert_eq!(view.next, None);
        assert_eq!(view.handoff_url, "/en/login/session");
    }
}
