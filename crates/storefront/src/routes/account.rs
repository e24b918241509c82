//! Account route handlers.
//!
//! These routes require a session token.

use axum::{
    Json,
    extract::{Path, State},
};
use marketstall_core::Profile;
use serde::Serialize;
use tower_sessions::Session;

use crate::cart::BoundedList;
use crate::error::{Result, set_sentry_user};
use crate::middleware::RequireToken;
use crate::state::AppState;
use crate::storage::{SessionStore, keys};

/// Account overview view.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub locale: String,
    pub profile: Profile,
    pub favorite_count: usize,
}

/// Display the account overview.
///
/// A rejected token surfaces as [`crate::error::AppError::Unauthorized`],
/// which redirects to login.
pub async fn index(
    State(state): State<AppState>,
    Path(locale): Path<String>,
    session: Session,
    RequireToken(token): RequireToken,
) -> Result<Json<AccountView>> {
    let profile = state.profiles().fetch_profile(&token).await?;
    set_sentry_user(&profile.id);

    let favorites = BoundedList::new(
        SessionStore::new(session),
        keys::FAVORITES,
        state.config().checkout.favorites_limit,
    );

    Ok(Json(AccountView {
        locale,
        favorite_count: favorites.entries().await?.len(),
        profile,
    }))
}
