//! Unified error handling with Sentry integration.
//!
//! Route handlers return `Result<T, AppError>`. Server-class errors are
//! captured to Sentry before responding; the client only ever sees a short
//! message suitable for a transient notification.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use marketstall_core::{FieldError, ValidationErrors};
use serde::Serialize;
use thiserror::Error;

use crate::cart::CartSyncError;
use crate::checkout::CheckoutError;
use crate::gateway::GatewayError;
use crate::storage::StorageError;

/// Where an authorization failure sends the shopper.
const SAFE_PAGE: &str = "/login";

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Commerce back-end call failed.
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Session storage failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// A checkout transition was rejected.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Input failed validation.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationErrors),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Shopper is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<CartSyncError> for AppError {
    fn from(err: CartSyncError) -> Self {
        match err {
            CartSyncError::Storage(e) => Self::Storage(e),
            CartSyncError::Gateway(e) => Self::Gateway(e),
        }
    }
}

/// JSON body of an error response.
#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<&'a [FieldError]>,
}

impl AppError {
    /// Normalize nested errors so status mapping only looks one level deep.
    fn flatten(self) -> Self {
        match self {
            Self::Checkout(CheckoutError::Validation(e)) => Self::Validation(e),
            Self::Checkout(CheckoutError::Order(e)) => Self::Gateway(e),
            Self::Gateway(GatewayError::Unauthorized) => {
                Self::Unauthorized("session expired".to_string())
            }
            Self::Gateway(GatewayError::NotFound(what)) => Self::NotFound(what),
            other => other,
        }
    }

    const fn status(&self) -> StatusCode {
        match self {
            Self::Gateway(GatewayError::Validation(_)) | Self::Validation(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::Gateway(GatewayError::RateLimited(_)) => StatusCode::TOO_MANY_REQUESTS,
            Self::Gateway(GatewayError::Forbidden) => StatusCode::FORBIDDEN,
            Self::Gateway(_) => StatusCode::BAD_GATEWAY,
            Self::Storage(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Checkout(CheckoutError::OutOfRange { .. }) => StatusCode::BAD_REQUEST,
            Self::Checkout(_) => StatusCode::CONFLICT,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    const fn code(&self) -> &'static str {
        match self {
            Self::Gateway(GatewayError::Validation(_)) | Self::Validation(_) => "validation",
            Self::Gateway(_) => "upstream",
            Self::Storage(_) | Self::Internal(_) => "internal",
            Self::Checkout(_) => "checkout",
            Self::NotFound(_) => "not_found",
            Self::Unauthorized(_) => "unauthorized",
            Self::BadRequest(_) => "bad_request",
        }
    }

    const fn is_server_error(&self) -> bool {
        match self {
            Self::Gateway(e) => !matches!(
                e,
                GatewayError::Validation(_) | GatewayError::RateLimited(_) | GatewayError::Forbidden
            ),
            Self::Storage(_) | Self::Internal(_) => true,
            _ => false,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let err = self.flatten();

        if err.is_server_error() {
            let event_id = sentry::capture_error(&err);
            tracing::error!(
                error = %err,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        // Authorization failures move the shopper to a safe page.
        if let Self::Unauthorized(reason) = &err {
            tracing::debug!(reason = %reason, "Redirecting unauthorized request");
            return Redirect::to(SAFE_PAGE).into_response();
        }

        // Don't expose internal error details to clients
        let message = match &err {
            Self::Storage(_) | Self::Internal(_) => "Something went wrong, please try again".to_string(),
            Self::Gateway(GatewayError::Validation(msg)) => msg.clone(),
            Self::Gateway(GatewayError::RateLimited(_)) => {
                "Too many requests, please try again shortly".to_string()
            }
            Self::Gateway(_) => "The store is temporarily unavailable".to_string(),
            Self::Checkout(e) => e.to_string(),
            Self::Validation(_) => "Please correct the highlighted fields".to_string(),
            Self::NotFound(_) => "Not found".to_string(),
            Self::Unauthorized(_) => "Please sign in".to_string(),
            Self::BadRequest(msg) => msg.clone(),
        };

        let fields = match &err {
            Self::Validation(v) => Some(v.errors.as_slice()),
            _ => None,
        };

        let body = ErrorBody {
            error: err.code(),
            message,
            fields,
        };
        (err.status(), Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from an account id.
pub fn set_sentry_user(account_id: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(account_id.to_string()),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the account.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for shopper actions.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("checkout", "Advanced to confirmation", Some(&[("step", "3")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::header::LOCATION;
    use marketstall_core::ShippingForm;

    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("order 42".to_string());
        assert_eq!(err.to_string(), "Not found: order 42");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            get_status(AppError::Gateway(GatewayError::Status {
                status: 500,
                body: String::new()
            })),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            get_status(AppError::Gateway(GatewayError::NotFound("order".into()))),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Checkout(CheckoutError::MissingShipping)),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_validation_is_unprocessable() {
        let errors = ShippingForm::default().validate().unwrap_err();
        assert_eq!(
            get_status(AppError::Checkout(CheckoutError::Validation(errors))),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_unauthorized_redirects() {
        let response = AppError::Gateway(GatewayError::Unauthorized).into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers().get(LOCATION).unwrap(), SAFE_PAGE);
    }
}
