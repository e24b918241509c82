//! Integration test harness for Marketstall.
//!
//! Drives the full storefront router in-process with `tower::ServiceExt`,
//! forwarding the session cookie between requests the way a browser would.
//! The commerce back-end is replaced by [`FakeBackend`].
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p marketstall-integration-tests
//! ```

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::collections::{HashMap, HashSet};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use chrono::Utc;
use marketstall_core::{
    AccountId, CartLine, CartLines, CartSnapshot, CurrencyCode, Order, OrderCreated, OrderId,
    OrderPaymentStatus, OrderRequest, ProductId, Profile, Quantity, Role,
};
use marketstall_storefront::config::{BackendConfig, CheckoutConfig, LocaleConfig, StorefrontConfig};
use marketstall_storefront::gateway::{
    GatewayError, OrderGateway, ProfileGateway, ServerCartGateway, SessionToken,
};
use marketstall_storefront::state::AppState;
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::Value;
use tower::ServiceExt;
use url::Url;

// =============================================================================
// Fake back-end
// =============================================================================

#[derive(Default)]
struct BackendState {
    accounts: HashMap<String, Profile>,
    carts: HashMap<AccountId, CartLines>,
    orders: HashMap<OrderId, Order>,
    created: Vec<OrderRequest>,
    failing_products: HashSet<ProductId>,
    profile_down: bool,
    next_order_id: i64,
}

/// In-memory commerce back-end.
///
/// Add-line intents sum with the existing quantity, like the real back-end.
/// Profile, add-line and order lookups yield once before answering, so
/// requests driven with `tokio::join!` interleave at those calls.
#[derive(Default)]
pub struct FakeBackend {
    state: Mutex<BackendState>,
}

impl FakeBackend {
    #[must_use]
    pub fn new() -> Arc<Self> {
        let backend = Self::default();
        backend.state.lock().unwrap().next_order_id = 100;
        Arc::new(backend)
    }

    /// Register an account reachable with `token`.
    pub fn add_account(&self, token: &str, id: i64, role: Role) {
        self.state.lock().unwrap().accounts.insert(
            token.to_string(),
            Profile {
                id: AccountId::new(id),
                role,
                name: Some(format!("Account {id}")),
                email: None,
            },
        );
    }

    /// Seed the server cart of an account.
    pub fn seed_cart(&self, account: i64, lines: Vec<CartLine>) {
        self.state
            .lock()
            .unwrap()
            .carts
            .insert(AccountId::new(account), CartLines::from(lines));
    }

    #[must_use]
    pub fn server_cart(&self, account: i64) -> CartLines {
        self.state
            .lock()
            .unwrap()
            .carts
            .get(&AccountId::new(account))
            .cloned()
            .unwrap_or_default()
    }

    /// Make add-line intents for `product_id` fail until healed.
    pub fn fail_product(&self, product_id: i64) {
        self.state
            .lock()
            .unwrap()
            .failing_products
            .insert(ProductId::new(product_id));
    }

    pub fn heal_product(&self, product_id: i64) {
        self.state
            .lock()
            .unwrap()
            .failing_products
            .remove(&ProductId::new(product_id));
    }

    /// Make every profile lookup fail with a server error.
    pub fn set_profile_down(&self, down: bool) {
        self.state.lock().unwrap().profile_down = down;
    }

    pub fn insert_order(&self, order: Order) {
        self.state.lock().unwrap().orders.insert(order.id, order);
    }

    #[must_use]
    pub fn created_orders(&self) -> Vec<OrderRequest> {
        self.state.lock().unwrap().created.clone()
    }

    fn account(&self, token: &SessionToken) -> Result<AccountId, GatewayError> {
        self.state
            .lock()
            .unwrap()
            .accounts
            .get(token.expose())
            .map(|p| p.id)
            .ok_or(GatewayError::Unauthorized)
    }

    fn snapshot(&self, account: AccountId) -> CartSnapshot {
        CartSnapshot {
            account_id: account,
            lines: self.server_cart(account.get()),
            currency_code: CurrencyCode::USD,
        }
    }
}

#[async_trait]
impl ProfileGateway for FakeBackend {
    async fn fetch_profile(&self, token: &SessionToken) -> Result<Profile, GatewayError> {
        tokio::task::yield_now().await;
        let state = self.state.lock().unwrap();
        if state.profile_down {
            return Err(GatewayError::Status {
                status: 503,
                body: "profile service unavailable".to_string(),
            });
        }
        state
            .accounts
            .get(token.expose())
            .cloned()
            .ok_or(GatewayError::Unauthorized)
    }
}

#[async_trait]
impl ServerCartGateway for FakeBackend {
    async fn fetch_cart(&self, token: &SessionToken) -> Result<CartSnapshot, GatewayError> {
        let account = self.account(token)?;
        Ok(self.snapshot(account))
    }

    async fn add_line(
        &self,
        token: &SessionToken,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<CartSnapshot, GatewayError> {
        tokio::task::yield_now().await;
        let account = self.account(token)?;
        {
            let mut state = self.state.lock().unwrap();
            if state.failing_products.contains(&product_id) {
                return Err(GatewayError::Status {
                    status: 500,
                    body: "cart write failed".to_string(),
                });
            }
            state.carts.entry(account).or_default().add(product_line(
                product_id.get(),
                quantity.get(),
            ));
        }
        Ok(self.snapshot(account))
    }

    async fn set_quantity(
        &self,
        token: &SessionToken,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartSnapshot, GatewayError> {
        let account = self.account(token)?;
        self.state
            .lock()
            .unwrap()
            .carts
            .entry(account)
            .or_default()
            .set_quantity(product_id, quantity);
        Ok(self.snapshot(account))
    }
}

#[async_trait]
impl OrderGateway for FakeBackend {
    async fn create_order(
        &self,
        token: &SessionToken,
        request: &OrderRequest,
    ) -> Result<OrderCreated, GatewayError> {
        let account = self.account(token)?;
        let mut state = self.state.lock().unwrap();
        let id = OrderId::new(state.next_order_id);
        state.next_order_id += 1;
        state.created.push(request.clone());
        state.orders.insert(
            id,
            Order {
                id,
                lines: request.cart.clone(),
                total: request.cart.subtotal(),
                currency_code: CurrencyCode::USD,
                payment_status: OrderPaymentStatus::Pending,
                shipping: Some(request.shipping.clone()),
                created_at: Utc::now(),
            },
        );
        state.carts.remove(&account);
        Ok(OrderCreated { order_id: id })
    }

    async fn fetch_order(&self, token: &SessionToken, id: OrderId) -> Result<Order, GatewayError> {
        tokio::task::yield_now().await;
        self.account(token)?;
        self.state
            .lock()
            .unwrap()
            .orders
            .get(&id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("order {id}")))
    }
}

/// A cart line for product `id` priced at 10.00.
#[must_use]
pub fn product_line(id: i64, quantity: u32) -> CartLine {
    CartLine {
        product_id: ProductId::new(id),
        name: format!("Product {id}"),
        unit_price: Decimal::new(1000, 2),
        quantity: Quantity::new(quantity).unwrap(),
        image_ref: None,
    }
}

/// A pending order with one line.
#[must_use]
pub fn sample_order(id: i64) -> Order {
    let lines = CartLines::from(vec![product_line(1, 2)]);
    Order {
        id: OrderId::new(id),
        total: lines.subtotal(),
        lines,
        currency_code: CurrencyCode::USD,
        payment_status: OrderPaymentStatus::Pending,
        shipping: None,
        created_at: Utc::now(),
    }
}

// =============================================================================
// Test application
// =============================================================================

/// Storefront configuration pointing at an unreachable back-end.
#[must_use]
pub fn test_config(checkout: CheckoutConfig) -> StorefrontConfig {
    StorefrontConfig {
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
        base_url: "http://localhost:3000".to_string(),
        backend: BackendConfig {
            api_url: Url::parse("http://backend.invalid/").unwrap(),
            api_key: SecretString::from("integration-test-key".to_string()),
            timeout: Duration::from_secs(1),
        },
        locales: LocaleConfig::default(),
        checkout,
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 0.0,
    }
}

/// A response with its body decoded.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub text: String,
    /// Parsed JSON body, `Null` when the body is not JSON.
    pub json: Value,
}

impl TestResponse {
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
    }
}

/// The router plus one browser's cookie jar.
pub struct TestApp {
    router: Router,
    cookie: Mutex<Option<String>>,
    pub backend: Arc<FakeBackend>,
}

impl TestApp {
    /// App with payment delegated to an external provider.
    #[must_use]
    pub fn new(backend: Arc<FakeBackend>) -> Self {
        Self::with_checkout(backend, CheckoutConfig::default())
    }

    #[must_use]
    pub fn with_checkout(backend: Arc<FakeBackend>, checkout: CheckoutConfig) -> Self {
        let state = AppState::with_gateways(
            test_config(checkout),
            backend.clone(),
            backend.clone(),
            backend.clone(),
        );
        Self {
            router: marketstall_storefront::app(state),
            cookie: Mutex::new(None),
            backend,
        }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(Method::GET, uri, None, Body::empty()).await
    }

    pub async fn post_json(&self, uri: &str, body: &Value) -> TestResponse {
        self.send(
            Method::POST,
            uri,
            Some("application/json"),
            Body::from(body.to_string()),
        )
        .await
    }

    pub async fn post_form(&self, uri: &str, body: &str) -> TestResponse {
        self.send(
            Method::POST,
            uri,
            Some("application/x-www-form-urlencoded"),
            Body::from(body.to_string()),
        )
        .await
    }

    /// Hand a session token to the storefront as the identity provider would.
    pub async fn sign_in(&self, token: &str) -> TestResponse {
        self.post_form("/en/login/session", &format!("token={token}"))
            .await
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        content_type: Option<&str>,
        body: Body,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(content_type) = content_type {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }
        if let Some(cookie) = self.cookie.lock().unwrap().clone() {
            builder = builder.header(header::COOKIE, cookie);
        }

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        if let Some(set_cookie) = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            && let Some(pair) = set_cookie.split(';').next()
        {
            *self.cookie.lock().unwrap() = Some(pair.to_string());
        }

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8_lossy(&bytes).into_owned();
        let json = serde_json::from_str(&text).unwrap_or(Value::Null);

        TestResponse {
            status,
            headers,
            text,
            json,
        }
    }
}
