//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server-side errors to
//! Sentry before responding. Every error response is JSON:
//!
//! ```json
//! { "error": "incorrect_code", "message": "Incorrect verification code" }
//! ```

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::validation::ValidationError;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Registration, verification or login failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Malformed body, path or query, or a field rule failed.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing or invalid bearer token.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated, but not allowed to touch this resource.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<notekeeper_core::EmailError> for AppError {
    fn from(err: notekeeper_core::EmailError) -> Self {
        Self::Validation(format!("email: {err}"))
    }
}

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

impl AppError {
    /// Whether this error is our fault rather than the caller's.
    fn is_server_error(&self) -> bool {
        match self {
            Self::Database(err) => !matches!(
                err,
                RepositoryError::NotFound | RepositoryError::Conflict(_)
            ),
            Self::Auth(err) => matches!(
                err,
                AuthError::Repository(_)
                    | AuthError::Cache(_)
                    | AuthError::PasswordHash
                    | AuthError::Token(_)
            ),
            Self::Internal(_) => true,
            _ => false,
        }
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        const INTERNAL: (StatusCode, &str) = (StatusCode::INTERNAL_SERVER_ERROR, "internal_error");

        match self {
            Self::Database(RepositoryError::NotFound) | Self::NotFound(_) => {
                (StatusCode::NOT_FOUND, "not_found")
            }
            Self::Database(RepositoryError::Conflict(_)) => (StatusCode::CONFLICT, "email_exists"),
            Self::Auth(err) => match err {
                AuthError::InvalidEmail(_) | AuthError::Validation(_) => {
                    (StatusCode::BAD_REQUEST, "validation_error")
                }
                AuthError::DuplicateEmail => (StatusCode::CONFLICT, "email_exists"),
                AuthError::RegistrationNotFound => {
                    (StatusCode::NOT_FOUND, "registration_not_found")
                }
                AuthError::CodeExpired => (StatusCode::GONE, "code_expired"),
                AuthError::IncorrectCode => (StatusCode::FORBIDDEN, "incorrect_code"),
                AuthError::WrongCredentials => (StatusCode::UNAUTHORIZED, "wrong_credentials"),
                AuthError::Repository(_)
                | AuthError::Cache(_)
                | AuthError::PasswordHash
                | AuthError::Token(_) => INTERNAL,
            },
            Self::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "invalid_token"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            Self::Database(_) | Self::Internal(_) => INTERNAL,
        }
    }

    fn client_message(&self) -> String {
        if self.is_server_error() {
            // Don't expose internal error details to clients
            return "Internal server error".to_string();
        }

        match self {
            Self::Database(RepositoryError::Conflict(_)) => {
                "An account with this email already exists".to_string()
            }
            Self::Database(_) => "Not found".to_string(),
            Self::Auth(err) => match err {
                AuthError::InvalidEmail(e) => format!("email: {e}"),
                AuthError::Validation(e) => e.to_string(),
                AuthError::DuplicateEmail => {
                    "An account with this email already exists".to_string()
                }
                AuthError::RegistrationNotFound => {
                    "No pending registration for this email".to_string()
                }
                AuthError::CodeExpired => "Verification code has expired".to_string(),
                AuthError::IncorrectCode => "Incorrect verification code".to_string(),
                _ => "Wrong email or password".to_string(),
            },
            Self::Validation(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::NotFound(msg)
            | Self::Internal(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let (status, code) = self.status_and_code();
        let body = ErrorBody {
            error: code,
            message: self.client_message(),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Called by the bearer middleware to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}
