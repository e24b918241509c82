//! Admin landing handler.
//!
//! Reached only through the route gate, which verifies the admin role and
//! attaches the profile to the request.

use axum::{Extension, Json, extract::Path};
use marketstall_core::Profile;
use serde::Serialize;

use crate::error::{AppError, Result};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminView {
    pub locale: String,
    pub profile: Profile,
}

/// Display the admin landing page.
pub async fn index(
    Path(locale): Path<String>,
    profile: Option<Extension<Profile>>,
) -> Result<Json<AdminView>> {
    let Some(Extension(profile)) = profile else {
        return Err(AppError::Unauthorized("admin profile missing".to_string()));
    };
    if !profile.role.is_admin() {
        return Err(AppError::Unauthorized("not an admin".to_string()));
    }

    Ok(Json(AdminView { locale, profile }))
}
