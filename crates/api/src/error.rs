//! Unified error handling with Sentry integration.
//!
//! All route handlers return `Result<T, AppError>`. Client-caused errors
//! (4xx) answer with `{"status":"fail","message":...}` and carry the real
//! message; server-side failures answer with `{"status":"error",...}`, a
//! generic message, and a Sentry capture.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::db::{OrderError, RepositoryError};
use crate::services::auth::AuthError;
use crate::services::checkout::CheckoutError;
use crate::services::email::EmailError;
use crate::services::media::MediaError;

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(RepositoryError),

    /// Order lifecycle rule violated.
    #[error("Order error: {0}")]
    Order(OrderError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Payment gateway operation failed.
    #[error("Checkout error: {0}")]
    Checkout(CheckoutError),

    /// Email delivery failed.
    #[error("Email error: {0}")]
    Email(#[from] EmailError),

    /// Image processing or upload failed.
    #[error("Media error: {0}")]
    Media(MediaError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not allowed.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Write conflicts with existing data.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => Self::NotFound("resource not found".to_owned()),
            RepositoryError::Conflict(message) => Self::Conflict(message),
            RepositoryError::Validation(message) => Self::BadRequest(message),
            err @ (RepositoryError::Database(_) | RepositoryError::DataCorruption(_)) => {
                Self::Database(err)
            }
        }
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::Repository(inner) => inner.into(),
            OrderError::EmptyCart
            | OrderError::InsufficientStock { .. }
            | OrderError::InvalidTransition { .. }
            | OrderError::NotCancellable => Self::Order(err),
        }
    }
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::SignatureFormat
            | CheckoutError::SignatureMismatch
            | CheckoutError::TimestampOutOfTolerance => {
                Self::Unauthorized("invalid webhook signature".to_owned())
            }
            CheckoutError::Payload(_) => Self::BadRequest("unreadable webhook payload".to_owned()),
            err @ (CheckoutError::Gateway(_) | CheckoutError::GatewayStatus { .. }) => {
                Self::Checkout(err)
            }
        }
    }
}

impl From<MediaError> for AppError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::Decode(_) => Self::BadRequest("uploaded file is not an image".to_owned()),
            err @ (MediaError::Upload(_) | MediaError::UploadStatus { .. }) => Self::Media(err),
        }
    }
}

impl AppError {
    const fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Internal(_) | Self::Email(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Checkout(_) | Self::Media(_) => StatusCode::BAD_GATEWAY,
            Self::Auth(_) | Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Order(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() || matches!(self, Self::Checkout(_) | Self::Media(_)) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Database(_) | Self::Internal(_) | Self::Email(_) => {
                "Internal server error".to_owned()
            }
            Self::Checkout(_) | Self::Media(_) => "External service error".to_owned(),
            Self::Auth(err) => match err {
                AuthError::TokenExpired => "Session expired, please log in again".to_owned(),
                AuthError::TokenInvalid => "You are not logged in".to_owned(),
                AuthError::Encoding(_) | AuthError::Hashing => {
                    "Authentication error".to_owned()
                }
            },
            Self::Order(err) => err.to_string(),
            Self::NotFound(message)
            | Self::Unauthorized(message)
            | Self::Forbidden(message)
            | Self::BadRequest(message)
            | Self::Conflict(message) => message.clone(),
        };

        let envelope = if status.is_server_error() {
            "error"
        } else {
            "fail"
        };
        let body = Json(json!({ "status": envelope, "message": message }));
        (status, body).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_owned())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_owned())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Forbidden("test".to_owned())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::Conflict("test".to_owned())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_owned())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_repository_error_mapping() {
        assert_eq!(
            get_status(RepositoryError::NotFound.into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(RepositoryError::Conflict("dup".to_owned()).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(RepositoryError::Validation("bad".to_owned()).into()),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_order_errors_are_client_errors() {
        assert_eq!(get_status(OrderError::EmptyCart.into()), StatusCode::BAD_REQUEST);
        assert_eq!(
            get_status(OrderError::NotCancellable.into()),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_webhook_signature_errors_are_unauthorized() {
        assert_eq!(
            get_status(CheckoutError::SignatureMismatch.into()),
            StatusCode::UNAUTHORIZED
        );
    }
}
