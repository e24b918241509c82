//! Home page handler.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;
use tower_sessions::Session;
use tracing::instrument;

use super::resolve_cart;
use crate::cart::{BoundedList, ListEntry};
use crate::error::Result;
use crate::flash::{self, Notice};
use crate::middleware::OptionalToken;
use crate::state::AppState;
use crate::storage::{SessionStore, keys};

/// Home page view.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeView {
    pub locale: String,
    pub signed_in: bool,
    /// Cart badge count, from the server cart once the merge has run.
    pub cart_count: u32,
    pub recently_viewed: Vec<ListEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notices: Vec<Notice>,
}

/// Display the home page.
#[instrument(skip(state, session, token))]
pub async fn home(
    State(state): State<AppState>,
    Path(locale): Path<String>,
    session: Session,
    OptionalToken(token): OptionalToken,
) -> Result<Json<HomeView>> {
    let store = SessionStore::new(session);
    let resolved = resolve_cart(&state, &store, token.as_ref()).await?;
    let recently_viewed = BoundedList::new(
        store.clone(),
        keys::RECENTLY_VIEWED,
        state.config().checkout.recently_viewed_limit,
    )
    .entries()
    .await?;

    Ok(Json(HomeView {
        locale,
        signed_in: resolved.cart.is_server(),
        cart_count: resolved.cart.total_quantity(),
        recently_viewed,
        notices: flash::drain(&store).await?,
    }))
}
