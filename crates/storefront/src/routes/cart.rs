//! Cart route handlers.
//!
//! Every handler first resolves the active cart, which runs the
//! identity-transition merge for this mount. Mutations then go to the server
//! cart for an authenticated shopper and to the local cart otherwise.

use axum::{
    Json,
    extract::{Path, State},
};
use marketstall_core::{CartLine, ProductId, Quantity};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use super::{ResolvedCart, resolve_cart};
use crate::cart::{ActiveCart, LocalCartStore};
use crate::error::{AppError, Result};
use crate::flash::{self, Notice};
use crate::gateway::SessionToken;
use crate::middleware::OptionalToken;
use crate::state::AppState;
use crate::storage::SessionStore;

/// Cart page view.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub locale: String,
    pub cart: ActiveCart,
    pub item_count: u32,
    pub subtotal: String,
    /// Products still waiting to be merged into the server cart.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pending_merge: Vec<ProductId>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notices: Vec<Notice>,
}

impl CartView {
    fn new(locale: String, resolved: ResolvedCart, notices: Vec<Notice>) -> Self {
        Self {
            locale,
            item_count: resolved.cart.total_quantity(),
            subtotal: resolved.cart.subtotal().display(),
            cart: resolved.cart,
            pending_merge: resolved.pending_merge,
            notices,
        }
    }
}

/// Product data posted by an add-to-cart control.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddLineRequest {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: Option<u32>,
    pub image_ref: Option<String>,
}

impl AddLineRequest {
    fn into_line(self) -> Result<CartLine> {
        let quantity = Quantity::new(self.quantity.unwrap_or(1))
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        Ok(CartLine {
            product_id: self.product_id,
            name: self.name,
            unit_price: self.unit_price,
            quantity,
            image_ref: self.image_ref,
        })
    }
}

/// Quantity change form data.
#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: u32,
}

enum CartOp {
    Add(CartLine),
    SetQuantity(ProductId, u32),
    Remove(ProductId),
    Toggle(CartLine),
}

/// Display the cart page.
#[instrument(skip(state, session, token))]
pub async fn show(
    State(state): State<AppState>,
    Path(locale): Path<String>,
    session: Session,
    OptionalToken(token): OptionalToken,
) -> Result<Json<CartView>> {
    let store = SessionStore::new(session);
    let resolved = resolve_cart(&state, &store, token.as_ref()).await?;
    let notices = flash::drain(&store).await?;
    Ok(Json(CartView::new(locale, resolved, notices)))
}

/// Add a line to the cart.
#[instrument(skip(state, session, token, request), fields(product_id = %request.product_id))]
pub async fn add(
    State(state): State<AppState>,
    Path(locale): Path<String>,
    session: Session,
    OptionalToken(token): OptionalToken,
    Json(request): Json<AddLineRequest>,
) -> Result<Json<CartView>> {
    let line = request.into_line()?;
    apply(&state, locale, session, token, CartOp::Add(line)).await
}

/// Set a line's quantity. Zero removes the line.
#[instrument(skip(state, session, token, request))]
pub async fn update(
    State(state): State<AppState>,
    Path((locale, product_id)): Path<(String, ProductId)>,
    session: Session,
    OptionalToken(token): OptionalToken,
    Json(request): Json<UpdateQuantityRequest>,
) -> Result<Json<CartView>> {
    let op = CartOp::SetQuantity(product_id, request.quantity);
    apply(&state, locale, session, token, op).await
}

/// Remove a line.
#[instrument(skip(state, session, token))]
pub async fn remove(
    State(state): State<AppState>,
    Path((locale, product_id)): Path<(String, ProductId)>,
    session: Session,
    OptionalToken(token): OptionalToken,
) -> Result<Json<CartView>> {
    apply(&state, locale, session, token, CartOp::Remove(product_id)).await
}

/// Add the product if absent, remove it if present.
#[instrument(skip(state, session, token, request), fields(product_id = %request.product_id))]
pub async fn toggle(
    State(state): State<AppState>,
    Path(locale): Path<String>,
    session: Session,
    OptionalToken(token): OptionalToken,
    Json(request): Json<AddLineRequest>,
) -> Result<Json<CartView>> {
    let line = request.into_line()?;
    apply(&state, locale, session, token, CartOp::Toggle(line)).await
}

async fn apply(
    state: &AppState,
    locale: String,
    session: Session,
    token: Option<SessionToken>,
    op: CartOp,
) -> Result<Json<CartView>> {
    let store = SessionStore::new(session);
    let resolved = resolve_cart(state, &store, token.as_ref()).await?;

    let cart = match (&resolved.cart, token.as_ref()) {
        (ActiveCart::Server { snapshot }, Some(token)) => {
            let server = state.server_cart();
            let snapshot = match op {
                CartOp::Add(line) => server.add_line(token, line.product_id, line.quantity).await?,
                CartOp::SetQuantity(product_id, quantity) => {
                    server.set_quantity(token, product_id, quantity).await?
                }
                CartOp::Remove(product_id) => server.set_quantity(token, product_id, 0).await?,
                CartOp::Toggle(line) if snapshot.lines.contains(line.product_id) => {
                    server.set_quantity(token, line.product_id, 0).await?
                }
                CartOp::Toggle(line) => {
                    server.add_line(token, line.product_id, line.quantity).await?
                }
            };
            ActiveCart::Server { snapshot }
        }
        _ => {
            let local = LocalCartStore::new(store.clone());
            let lines = match op {
                CartOp::Add(line) => local.add(line).await?,
                CartOp::SetQuantity(product_id, quantity) => {
                    local.set_quantity(product_id, quantity).await?
                }
                CartOp::Remove(product_id) => local.remove(product_id).await?,
                CartOp::Toggle(line) => local.toggle(line).await?,
            };
            ActiveCart::Local { lines }
        }
    };

    let resolved = ResolvedCart {
        cart,
        pending_merge: resolved.pending_merge,
    };
    let notices = flash::drain(&store).await?;
    Ok(Json(CartView::new(locale, resolved, notices)))
}
