//! Order detail handler.
//!
//! The order page is also where the payment provider sends the shopper
//! back. A `success` or `canceled` indicator is surfaced once as a flash
//! notice and stripped by redirecting to the normalized URL. The marker
//! check runs under the session's lock, so two tabs opening the same
//! provider link notify once between them.

use axum::{
    Json,
    extract::{Path, RawQuery, State},
    http::Uri,
    response::{IntoResponse, Redirect, Response},
};
use marketstall_core::{Order, OrderId, PaymentOutcome, Price};
use serde::Serialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::flash::{self, Notice};
use crate::middleware::RequireToken;
use crate::payment::{PaymentCallbackReconciler, parse_query};
use crate::state::AppState;
use crate::storage::{KeyValueStore, SessionStore};

/// Order detail view.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub locale: String,
    pub order: Order,
    pub total: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notices: Vec<Notice>,
}

/// Display an order.
///
/// An unknown or malformed id renders the not-found view.
#[instrument(skip(state, session, token, uri, query))]
pub async fn show(
    State(state): State<AppState>,
    Path((locale, order_id)): Path<(String, String)>,
    uri: Uri,
    RawQuery(query): RawQuery,
    session: Session,
    RequireToken(token): RequireToken,
) -> Result<Response> {
    let order_id: OrderId = order_id
        .parse()
        .map_err(|_| AppError::NotFound(format!("order {order_id}")))?;

    let order = state.orders().fetch_order(&token, order_id).await?;

    let store = SessionStore::new(session);
    let _guard = store.lock_exclusive(state.session_locks()).await?;
    let reconciler = PaymentCallbackReconciler::new(store.clone());
    let params = parse_query(query.as_deref());

    if let Some(fired) = reconciler.reconcile(order_id, &params).await? {
        let notice = match fired.notice.outcome {
            PaymentOutcome::Succeeded => Notice::success(fired.notice.message()),
            PaymentOutcome::Canceled => Notice::error(fired.notice.message()),
        };
        flash::push(&store, notice).await?;
        store.flush().await?;
        return Ok(Redirect::to(&fired.normalized_url(uri.path())).into_response());
    }

    let notices = flash::drain(&store).await?;
    let total = Price::new(order.total, order.currency_code).display();

    Ok(Json(OrderView {
        locale,
        order,
        total,
        notices,
    })
    .into_response())
}
