//! Bearer token authentication.
//!
//! `require_bearer` runs before protected handlers: it verifies the
//! `Authorization: Bearer <token>` header and stores the token's identity in
//! request extensions. Handlers read it back with the [`CurrentUser`]
//! extractor.
//!
//! # Example
//!
//! ```rust,ignore
//! let protected = Router::new()
//!     .route("/notes", get(list_notes))
//!     .route_layer(middleware::from_fn_with_state(state.clone(), require_bearer));
//!
//! async fn list_notes(CurrentUser(user): CurrentUser) -> impl IntoResponse {
//!     format!("notes for {}", user.user_id)
//! }
//! ```

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use tracing::Span;

use crate::error::{AppError, set_sentry_user};
use crate::models::AuthPayload;
use crate::services::token::TokenError;
use crate::state::AppState;

const BEARER_PREFIX: &str = "Bearer ";

/// Reject requests without a valid bearer token.
///
/// # Errors
///
/// Returns `AppError::Unauthorized` if the header is missing, uses another
/// scheme, or carries a malformed, tampered or expired token.
pub async fn require_bearer(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix(BEARER_PREFIX))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?;

    let claims = state.tokens().verify(token).map_err(|e| {
        tracing::debug!(error = %e, "Rejected bearer token");
        AppError::Unauthorized(
            match e {
                TokenError::Expired => "Token expired",
                _ => "Invalid token",
            }
            .to_string(),
        )
    })?;

    Span::current().record("user_id", claims.user_id.as_i64());
    set_sentry_user(&claims.user_id, Some(claims.email.as_str()));

    request.extensions_mut().insert(AuthPayload {
        user_id: claims.user_id,
        email: claims.email,
    });

    Ok(next.run(request).await)
}

/// Extractor for the identity attached by [`require_bearer`].
///
/// Rejects with 401 if used on a route the middleware doesn't cover.
pub struct CurrentUser(pub AuthPayload);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthPayload>()
            .cloned()
            .map(Self)
            .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))
    }
}
