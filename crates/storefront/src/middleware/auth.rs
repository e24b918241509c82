//! Session token extractors and helpers.
//!
//! The identity provider hands the storefront an opaque session token which
//! lives in the shopper's session. These extractors read it in handlers.

use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::gate::login_url;
use crate::gateway::SessionToken;
use crate::storage::keys;

/// Extractor that requires a session token.
///
/// The route gate already redirects protected paths without a token; this
/// rejection only fires if a handler is reached some other way.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireToken(token): RequireToken) -> impl IntoResponse {
///     state.profiles().fetch_profile(&token).await
/// }
/// ```
pub struct RequireToken(pub SessionToken);

/// Rejection for [`RequireToken`]: the localized login page, continuing to
/// the requested URL.
#[derive(Debug)]
pub struct TokenRejection {
    location: String,
}

impl TokenRejection {
    fn for_request(parts: &Parts) -> Self {
        let path = parts.uri.path();
        let locale = path
            .trim_start_matches('/')
            .split('/')
            .next()
            .filter(|segment| !segment.is_empty());
        let location = match locale {
            Some(locale) => login_url(locale, path, parts.uri.query()),
            // The gate localizes this on the next request.
            None => "/login".to_string(),
        };
        Self { location }
    }

    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }
}

impl IntoResponse for TokenRejection {
    fn into_response(self) -> Response {
        Redirect::to(&self.location).into_response()
    }
}

impl<S> FromRequestParts<S> for RequireToken
where
    S: Send + Sync,
{
    type Rejection = TokenRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = match parts.extensions.get::<Session>() {
            Some(session) => current_token(session).await,
            None => None,
        };

        token
            .map(Self)
            .ok_or_else(|| TokenRejection::for_request(parts))
    }
}

/// Extractor that optionally gets the session token.
pub struct OptionalToken(pub Option<SessionToken>);

impl<S> FromRequestParts<S> for OptionalToken
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = match parts.extensions.get::<Session>() {
            Some(session) => current_token(session).await,
            None => None,
        };

        Ok(Self(token))
    }
}

/// Read the session token. A session read failure counts as no token.
pub async fn current_token(session: &Session) -> Option<SessionToken> {
    session
        .get::<SessionToken>(keys::SESSION_TOKEN)
        .await
        .inspect_err(|e| tracing::warn!(error = %e, "Failed to read session token"))
        .ok()
        .flatten()
}

/// Store the session token handed over by the identity provider.
///
/// The session id is cycled to prevent fixation.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_session_token(
    session: &Session,
    token: &SessionToken,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(keys::SESSION_TOKEN, token).await
}

/// Clear the session token (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_session_token(
    session: &Session,
) -> Result<(), tower_sessions::session::Error> {
    session.remove::<SessionToken>(keys::SESSION_TOKEN).await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::{Request, StatusCode, header};

    use super::*;

    async fn reject(uri: &str) -> Response {
        let (mut parts, ()) = Request::builder().uri(uri).body(()).unwrap().into_parts();
        match RequireToken::from_request_parts(&mut parts, &()).await {
            Ok(_) => panic!("expected a rejection without a session"),
            Err(rejection) => rejection.into_response(),
        }
    }

    #[tokio::test]
    async fn test_missing_token_redirects_to_localized_login() {
        let res = reject("/ar/orders/5?success=true").await;

        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            res.headers()[header::LOCATION],
            "/ar/login?next=%2Far%2Forders%2F5%3Fsuccess%3Dtrue"
        );
    }

    #[tokio::test]
    async fn test_missing_token_at_root_redirects_to_login() {
        let res = reject("/").await;

        assert_eq!(res.headers()[header::LOCATION], "/login");
    }
}
