//! Favorites and recently viewed handlers.
//!
//! Both lists are session-only. Favorites toggle optimistically: the local
//! mutation is the whole operation.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::cart::{BoundedList, ListEntry};
use crate::error::Result;
use crate::state::AppState;
use crate::storage::{SessionStore, keys};

/// A bounded list view.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListView {
    pub locale: String,
    pub entries: Vec<ListEntry>,
    pub limit: usize,
}

/// Result of a favorite toggle.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleView {
    pub favorited: bool,
    #[serde(flatten)]
    pub list: ListView,
}

fn favorites(state: &AppState, session: Session) -> BoundedList<SessionStore> {
    BoundedList::new(
        SessionStore::new(session),
        keys::FAVORITES,
        state.config().checkout.favorites_limit,
    )
}

fn recently_viewed_list(state: &AppState, session: Session) -> BoundedList<SessionStore> {
    BoundedList::new(
        SessionStore::new(session),
        keys::RECENTLY_VIEWED,
        state.config().checkout.recently_viewed_limit,
    )
}

async fn view(locale: String, list: &BoundedList<SessionStore>) -> Result<ListView> {
    Ok(ListView {
        locale,
        entries: list.entries().await?,
        limit: list.limit(),
    })
}

/// Display favorites.
#[instrument(skip(state, session))]
pub async fn favorites_page(
    State(state): State<AppState>,
    Path(locale): Path<String>,
    session: Session,
) -> Result<Json<ListView>> {
    let list = favorites(&state, session);
    Ok(Json(view(locale, &list).await?))
}

/// Toggle a product in favorites.
#[instrument(skip(state, session, entry), fields(product_id = %entry.product_id))]
pub async fn toggle_favorite(
    State(state): State<AppState>,
    Path(locale): Path<String>,
    session: Session,
    Json(entry): Json<ListEntry>,
) -> Result<Json<ToggleView>> {
    let list = favorites(&state, session);
    let favorited = list.toggle(entry).await?;
    Ok(Json(ToggleView {
        favorited,
        list: view(locale, &list).await?,
    }))
}

/// Remove every favorite.
#[instrument(skip(state, session))]
pub async fn clear_favorites(
    State(state): State<AppState>,
    Path(locale): Path<String>,
    session: Session,
) -> Result<Json<ListView>> {
    let list = favorites(&state, session);
    list.clear().await?;
    Ok(Json(view(locale, &list).await?))
}

/// Display recently viewed products.
#[instrument(skip(state, session))]
pub async fn recently_viewed(
    State(state): State<AppState>,
    Path(locale): Path<String>,
    session: Session,
) -> Result<Json<ListView>> {
    let list = recently_viewed_list(&state, session);
    Ok(Json(view(locale, &list).await?))
}

/// Record a product view.
#[instrument(skip(state, session, entry), fields(product_id = %entry.product_id))]
pub async fn record_view(
    State(state): State<AppState>,
    Path(locale): Path<String>,
    session: Session,
    Json(entry): Json<ListEntry>,
) -> Result<Json<ListView>> {
    let list = recently_viewed_list(&state, session);
    list.push(entry).await?;
    Ok(Json(view(locale, &list).await?))
}
