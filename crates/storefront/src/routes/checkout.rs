//! Checkout route handlers.
//!
//! `GET /checkout` mounts the checkout page and rebuilds its state from the
//! `step` parameter alone. In-page interactions resume the stored session,
//! and only a successful transition is written back, so a rejected one
//! leaves the stored cursor untouched.
//!
//! Every handler resolves the cart before touching the session, since the
//! merge may reload the session record.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use marketstall_core::{CheckoutStep, OrderId, PaymentMethod, ShippingForm};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use super::{ResolvedCart, resolve_cart};
use crate::cart::{ActiveCart, LocalCartStore};
use crate::checkout::{CheckoutMachine, CheckoutSession, StepParamSource};
use crate::error::{Result, add_breadcrumb};
use crate::flash::{self, Notice};
use crate::middleware::RequireToken;
use crate::state::AppState;
use crate::storage::{KeyValueStore, SessionStore, keys, load_typed, save_typed};

/// Checkout `step` query parameter.
#[derive(Debug, Deserialize)]
pub struct StepQuery {
    pub step: Option<String>,
}

/// Body of the "Next" control.
///
/// On the shipping step the form travels with it so "Next" and the form's
/// own submit share one validation path.
#[derive(Debug, Default, Deserialize)]
pub struct NextRequest {
    #[serde(default)]
    pub shipping: Option<ShippingForm>,
}

/// Body of the payment-method step.
#[derive(Debug, Deserialize)]
pub struct PaymentMethodRequest {
    pub method: PaymentMethod,
}

/// Checkout page view.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutView {
    pub locale: String,
    pub step: CheckoutStep,
    pub position: usize,
    pub steps: Vec<CheckoutStep>,
    pub session: CheckoutSession,
    pub cart: ActiveCart,
    pub subtotal: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notices: Vec<Notice>,
}

/// Result of a confirmed checkout.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPlacedView {
    pub order_id: OrderId,
    pub order_url: String,
}

async fn load_machine(state: &AppState, store: &SessionStore) -> Result<CheckoutMachine> {
    let session: CheckoutSession = load_typed(store, keys::CHECKOUT_SESSION)
        .await?
        .unwrap_or_default();
    Ok(CheckoutMachine::restore(state.step_sequence().clone(), session))
}

async fn save_machine(store: &SessionStore, machine: &CheckoutMachine) -> Result<()> {
    save_typed(store, keys::CHECKOUT_SESSION, machine.session()).await?;
    Ok(())
}

async fn render(
    store: &SessionStore,
    locale: String,
    resolved: ResolvedCart,
    machine: CheckoutMachine,
) -> Result<Json<CheckoutView>> {
    let notices = flash::drain(store).await?;

    Ok(Json(CheckoutView {
        locale,
        step: machine.current_step(),
        position: machine.current_position(),
        steps: machine.sequence().steps().to_vec(),
        subtotal: resolved.cart.subtotal().display(),
        cart: resolved.cart,
        session: machine.into_session(),
        notices,
    }))
}

/// Mount the checkout page.
///
/// Any stored progress is discarded; the position comes from the URL only.
#[instrument(skip(state, session, token))]
pub async fn mount(
    State(state): State<AppState>,
    Path(locale): Path<String>,
    Query(query): Query<StepQuery>,
    session: Session,
    RequireToken(token): RequireToken,
) -> Result<Json<CheckoutView>> {
    let store = SessionStore::new(session);
    let resolved = resolve_cart(&state, &store, Some(&token)).await?;
    let machine = CheckoutMachine::mount(state.step_sequence().clone(), query.step.as_deref());
    save_machine(&store, &machine).await?;
    render(&store, locale, resolved, machine).await
}

/// Apply a changed `step` parameter while the page is open.
#[instrument(skip(state, session, token))]
pub async fn step_changed(
    State(state): State<AppState>,
    Path(locale): Path<String>,
    Query(query): Query<StepQuery>,
    session: Session,
    RequireToken(token): RequireToken,
) -> Result<Json<CheckoutView>> {
    let store = SessionStore::new(session);
    let resolved = resolve_cart(&state, &store, Some(&token)).await?;
    let mut machine = load_machine(&state, &store).await?;
    if machine.apply_step_param(query.step.as_deref(), StepParamSource::Update)? {
        save_machine(&store, &machine).await?;
    }
    render(&store, locale, resolved, machine).await
}

/// Advance one step.
#[instrument(skip(state, session, token, request))]
pub async fn next(
    State(state): State<AppState>,
    Path(locale): Path<String>,
    session: Session,
    RequireToken(token): RequireToken,
    Json(request): Json<NextRequest>,
) -> Result<Json<CheckoutView>> {
    let store = SessionStore::new(session);
    let resolved = resolve_cart(&state, &store, Some(&token)).await?;
    let mut machine = load_machine(&state, &store).await?;

    let step = match (machine.current_step(), request.shipping) {
        (CheckoutStep::ShippingDetails, Some(form)) => machine.submit_shipping_and_advance(&form)?,
        _ => machine.next_step()?,
    };
    save_machine(&store, &machine).await?;
    add_breadcrumb("checkout", "Advanced step", Some(&[("step", step.query_value())]));

    render(&store, locale, resolved, machine).await
}

/// Submit shipping details without advancing.
#[instrument(skip(state, session, token, form))]
pub async fn shipping(
    State(state): State<AppState>,
    Path(locale): Path<String>,
    session: Session,
    RequireToken(token): RequireToken,
    Json(form): Json<ShippingForm>,
) -> Result<Json<CheckoutView>> {
    let store = SessionStore::new(session);
    let resolved = resolve_cart(&state, &store, Some(&token)).await?;
    let mut machine = load_machine(&state, &store).await?;
    machine.submit_shipping(&form)?;
    save_machine(&store, &machine).await?;
    render(&store, locale, resolved, machine).await
}

/// Record the payment method.
#[instrument(skip(state, session, token))]
pub async fn payment_method(
    State(state): State<AppState>,
    Path(locale): Path<String>,
    session: Session,
    RequireToken(token): RequireToken,
    Json(request): Json<PaymentMethodRequest>,
) -> Result<Json<CheckoutView>> {
    let store = SessionStore::new(session);
    let resolved = resolve_cart(&state, &store, Some(&token)).await?;
    let mut machine = load_machine(&state, &store).await?;
    machine.select_payment_method(request.method)?;
    save_machine(&store, &machine).await?;
    render(&store, locale, resolved, machine).await
}

/// Create the order from the confirmation step.
///
/// On success the checkout session ends and the order page takes over.
#[instrument(skip(state, session, token))]
pub async fn confirm(
    State(state): State<AppState>,
    Path(locale): Path<String>,
    session: Session,
    RequireToken(token): RequireToken,
) -> Result<Json<OrderPlacedView>> {
    let store = SessionStore::new(session);
    let resolved = resolve_cart(&state, &store, Some(&token)).await?;
    let machine = load_machine(&state, &store).await?;

    let created = machine
        .confirm(resolved.cart.lines().clone(), state.orders(), &token)
        .await?;

    store.clear(keys::CHECKOUT_SESSION).await?;
    if !resolved.cart.is_server() {
        LocalCartStore::new(store.clone()).clear().await?;
    }
    flash::push(&store, Notice::info("Your order has been placed.")).await?;

    Ok(Json(OrderPlacedView {
        order_url: format!("/{locale}/orders/{}", created.order_id),
        order_id: created.order_id,
    }))
}
