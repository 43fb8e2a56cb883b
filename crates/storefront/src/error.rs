//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//! Every error response is JSON: `{"error": "<message>"}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::checkout::CheckoutError;
use crate::services::lockers::LockerError;
use crate::services::mailing::SchedulerError;
use crate::services::payments::PaymentError;
use crate::services::payments::webhook::WebhookError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Checkout form failed validation.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Payment provider call failed.
    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    /// Payment webhook rejected.
    #[error("Webhook error: {0}")]
    Webhook(#[from] WebhookError),

    /// Locker directory unavailable.
    #[error("Locker error: {0}")]
    Lockers(#[from] LockerError),

    /// Partner mail run could not start.
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User is authenticated but not allowed.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// A write failed; the message is shown to the client as-is.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Internal(_) | Self::Scheduler(_) | Self::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Payment(_) | Self::Lockers(_) => StatusCode::BAD_GATEWAY,
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::UserAlreadyExists => StatusCode::CONFLICT,
                AuthError::WeakPassword(_) | AuthError::InvalidEmail(_) => StatusCode::BAD_REQUEST,
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Checkout(_) | Self::Webhook(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    /// Message safe to show to the client.
    fn client_message(&self) -> String {
        // Don't expose internal error details to clients
        match self {
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::Scheduler(_) => "db error".to_string(),
            Self::Payment(_) => "Payment provider error".to_string(),
            Self::Lockers(_) => "InPost API error".to_string(),
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => "Nieprawidłowy email/hasło".to_string(),
                AuthError::UserAlreadyExists => {
                    "An account with this email already exists".to_string()
                }
                AuthError::WeakPassword(msg) => msg.clone(),
                AuthError::InvalidEmail(_) => "Invalid email address".to_string(),
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    "Internal server error".to_string()
                }
            },
            Self::Checkout(err) => err.to_string(),
            Self::Webhook(err) => err.to_string(),
            Self::NotFound(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::BadRequest(msg)
            | Self::Storage(msg) => msg.clone(),
            Self::RateLimited => "Rate limited".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        (status, Json(json!({ "error": self.client_message() }))).into_response()
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

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
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
mod tests {
    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("chapter 9".to_string());
        assert_eq!(err.to_string(), "Not found: chapter 9");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            AppError::NotFound("test".to_string()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Forbidden("test".to_string()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::Checkout(CheckoutError::MissingName).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Lockers(LockerError::Unavailable {
                diagnostics: Vec::new()
            })
            .status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::Payment(PaymentError::MissingUrl).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::Auth(AuthError::InvalidCredentials).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AppError::RateLimited.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn test_client_messages_hide_internals() {
        assert_eq!(
            AppError::Internal("pool exhausted".to_string()).client_message(),
            "Internal server error"
        );
        assert_eq!(
            AppError::Lockers(LockerError::Unavailable {
                diagnostics: Vec::new()
            })
            .client_message(),
            "InPost API error"
        );
        assert_eq!(
            AppError::Checkout(CheckoutError::MissingLocker).client_message(),
            "Brak wybranego paczkomatu."
        );
    }
}
