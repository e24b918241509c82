//! HTTP client for the commerce back-end.
//!
//! Requests carry the shopper's session token as a bearer credential and the
//! storefront's service key in `X-Api-Key`. Bodies are camelCase JSON.

use std::sync::Arc;

use async_trait::async_trait;
use marketstall_core::{
    CartSnapshot, Order, OrderCreated, OrderId, OrderRequest, ProductId, Profile, Quantity,
};
use reqwest::StatusCode;
use secrecy::ExposeSecret;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::json;
use tracing::instrument;
use url::Url;

use super::{GatewayError, OrderGateway, ProfileGateway, ServerCartGateway, SessionToken};
use crate::config::BackendConfig;

const API_KEY_HEADER: &str = "X-Api-Key";

/// Client for the commerce back-end API.
///
/// Cheap to clone; all clones share one connection pool.
#[derive(Clone)]
pub struct BackendClient {
    inner: Arc<BackendClientInner>,
}

struct BackendClientInner {
    client: reqwest::Client,
    base_url: Url,
    api_key: String,
}

impl BackendClient {
    /// Create a new back-end client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &BackendConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(BackendClientInner {
                client,
                base_url: config.api_url.clone(),
                api_key: config.api_key.expose_secret().to_string(),
            }),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, GatewayError> {
        Ok(self.inner.base_url.join(path)?)
    }

    fn request(
        &self,
        method: reqwest::Method,
        url: Url,
        token: &SessionToken,
    ) -> reqwest::RequestBuilder {
        self.inner
            .client
            .request(method, url)
            .bearer_auth(token.expose())
            .header(API_KEY_HEADER, &self.inner.api_key)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        token: &SessionToken,
    ) -> Result<T, GatewayError> {
        let url = self.endpoint(path)?;
        let response = self.request(reqwest::Method::GET, url, token).send().await?;
        decode(response, path).await
    }

    async fn send_json<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
        token: &SessionToken,
        body: &B,
    ) -> Result<T, GatewayError> {
        let url = self.endpoint(path)?;
        let response = self
            .request(method, url, token)
            .json(body)
            .send()
            .await?;
        decode(response, path).await
    }
}

/// Map a response to a typed body or a [`GatewayError`].
async fn decode<T: DeserializeOwned>(
    response: reqwest::Response,
    path: &str,
) -> Result<T, GatewayError> {
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(1);
        return Err(GatewayError::RateLimited(retry_after));
    }

    // Read the body first for better error diagnostics
    let body = response.text().await?;

    match status {
        s if s.is_success() => serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                path,
                body = %body.chars().take(500).collect::<String>(),
                "Failed to parse back-end response"
            );
            GatewayError::Parse(e)
        }),
        StatusCode::UNAUTHORIZED => Err(GatewayError::Unauthorized),
        StatusCode::FORBIDDEN => Err(GatewayError::Forbidden),
        StatusCode::NOT_FOUND => Err(GatewayError::NotFound(path.to_string())),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            Err(GatewayError::Validation(error_message(&body)))
        }
        _ => {
            tracing::error!(
                status = %status,
                path,
                body = %body.chars().take(500).collect::<String>(),
                "Back-end returned non-success status"
            );
            Err(GatewayError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            })
        }
    }
}

/// Pull a human-readable message out of an error body.
///
/// Accepts `{"message": "..."}`, `{"error": "..."}` or plain text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(|m| m.as_str().map(str::to_owned))
        })
        .unwrap_or_else(|| body.chars().take(200).collect())
}

#[async_trait]
impl ProfileGateway for BackendClient {
    #[instrument(skip(self, token))]
    async fn fetch_profile(&self, token: &SessionToken) -> Result<Profile, GatewayError> {
        self.get("profile", token).await
    }
}

#[async_trait]
impl ServerCartGateway for BackendClient {
    #[instrument(skip(self, token))]
    async fn fetch_cart(&self, token: &SessionToken) -> Result<CartSnapshot, GatewayError> {
        self.get("cart", token).await
    }

    #[instrument(skip(self, token))]
    async fn add_line(
        &self,
        token: &SessionToken,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<CartSnapshot, GatewayError> {
        let body = json!({ "productId": product_id, "quantity": quantity });
        self.send_json(reqwest::Method::POST, "cart/lines", token, &body)
            .await
    }

    #[instrument(skip(self, token))]
    async fn set_quantity(
        &self,
        token: &SessionToken,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartSnapshot, GatewayError> {
        let body = json!({ "quantity": quantity });
        let path = format!("cart/lines/{product_id}");
        self.send_json(reqwest::Method::PUT, &path, token, &body)
            .await
    }
}

#[async_trait]
impl OrderGateway for BackendClient {
    #[instrument(skip(self, token, request), fields(lines = request.cart.len()))]
    async fn create_order(
        &self,
        token: &SessionToken,
        request: &OrderRequest,
    ) -> Result<OrderCreated, GatewayError> {
        self.send_json(reqwest::Method::POST, "orders", token, request)
            .await
    }

    #[instrument(skip(self, token))]
    async fn fetch_order(&self, token: &SessionToken, id: OrderId) -> Result<Order, GatewayError> {
        let path = format!("orders/{id}");
        self.get(&path, token).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use secrecy::SecretString;

    use super::*;

    fn client(base: &str) -> BackendClient {
        BackendClient::new(&BackendConfig {
            api_url: Url::parse(base).unwrap(),
            api_key: SecretString::from("k3y"),
            timeout: Duration::from_secs(1),
        })
        .unwrap()
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let client = client("https://api.shop.test/v2/");
        assert_eq!(
            client.endpoint("orders/42").unwrap().as_str(),
            "https://api.shop.test/v2/orders/42"
        );
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(error_message(r#"{"message":"out of stock"}"#), "out of stock");
        assert_eq!(error_message(r#"{"error":"bad quantity"}"#), "bad quantity");
        assert_eq!(error_message("plain failure"), "plain failure");
    }
}
