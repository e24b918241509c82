//! Collaborator interfaces to the commerce back-end.
//!
//! # Architecture
//!
//! - The back-end owns the server cart, orders and account profiles
//! - The storefront only issues intents and renders the echoed state
//! - Each collaborator is an async trait so the coordinator, the reconciler
//!   and the route gate take them as injectable capabilities
//!
//! [`BackendClient`] implements every trait over HTTP.
//!
//! # Example
//!
//! ```rust,ignore
//! use marketstall_storefront::gateway::{BackendClient, ServerCartGateway};
//!
//! let client = BackendClient::new(&config.backend)?;
//! let cart = client.add_line(&token, ProductId::new(7), Quantity::ONE).await?;
//! ```

mod backend;

pub use backend::BackendClient;

use async_trait::async_trait;
use marketstall_core::{
    CartSnapshot, Order, OrderCreated, OrderId, OrderRequest, ProductId, Profile, Quantity,
};
use thiserror::Error;

/// An opaque session token issued by the identity provider.
#[derive(Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    /// Wrap a token. Blank tokens are rejected.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        let trimmed = token.trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_owned()))
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionToken([REDACTED])")
    }
}

/// Errors that can occur when talking to the back-end.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// HTTP request failed (connection, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The session token was rejected (401).
    #[error("Unauthorized")]
    Unauthorized,

    /// The account may not perform this action (403).
    #[error("Forbidden")]
    Forbidden,

    /// Resource not found (404).
    #[error("Not found: {0}")]
    NotFound(String),

    /// The back-end rejected the input (400/422).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Rate limited by the back-end.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Any other non-success status.
    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The configured base URL could not be joined with an endpoint path.
    #[error("Invalid endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
}

impl GatewayError {
    /// Whether retrying the same call later could succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) | Self::RateLimited(_) => true,
            Self::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Profile/role lookup.
#[async_trait]
pub trait ProfileGateway: Send + Sync {
    /// `GET` profile for the token's account.
    ///
    /// Returns [`GatewayError::Unauthorized`] when the token is not valid.
    async fn fetch_profile(&self, token: &SessionToken) -> Result<Profile, GatewayError>;
}

/// Authoritative, per-account cart.
///
/// The back-end sums a new line with any existing quantity for the same
/// product. The storefront assumes this; it does not enforce it.
#[async_trait]
pub trait ServerCartGateway: Send + Sync {
    /// Current server cart.
    async fn fetch_cart(&self, token: &SessionToken) -> Result<CartSnapshot, GatewayError>;

    /// `POST` add-line intent; additive on the server.
    async fn add_line(
        &self,
        token: &SessionToken,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<CartSnapshot, GatewayError>;

    /// Change a line's quantity; zero removes it.
    async fn set_quantity(
        &self,
        token: &SessionToken,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartSnapshot, GatewayError>;
}

/// Order creation and lookup.
#[async_trait]
pub trait OrderGateway: Send + Sync {
    /// Create an order from the accumulated checkout data.
    async fn create_order(
        &self,
        token: &SessionToken,
        request: &OrderRequest,
    ) -> Result<OrderCreated, GatewayError>;

    /// `GET` order by id.
    async fn fetch_order(&self, token: &SessionToken, id: OrderId) -> Result<Order, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_token_rejects_blank() {
        assert!(SessionToken::new("   ").is_none());
        assert_eq!(SessionToken::new(" abc ").map(|t| t.expose().to_owned()), Some("abc".to_owned()));
    }

    #[test]
    fn test_session_token_debug_is_redacted() {
        let token = SessionToken::new("very-private").expect("non-blank");
        assert!(!format!("{token:?}").contains("very-private"));
    }

    #[test]
    fn test_gateway_error_display() {
        let err = GatewayError::NotFound("order 42".to_string());
        assert_eq!(err.to_string(), "Not found: order 42");

        let err = GatewayError::RateLimited(30);
        assert_eq!(err.to_string(), "Rate limited, retry after 30 seconds");
    }

    #[test]
    fn test_transient_classification() {
        assert!(GatewayError::RateLimited(1).is_transient());
        assert!(
            GatewayError::Status {
                status: 503,
                body: String::new()
            }
            .is_transient()
        );
        assert!(!GatewayError::Unauthorized.is_transient());
        assert!(!GatewayError::Validation("bad".into()).is_transient());
    }
}
