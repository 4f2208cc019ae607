//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health               - Liveness probe
//! GET    /health/ready         - Readiness probe (database ping)
//! GET    /media/*              - Static files from MEDIA_DIR
//!
//! # Auth (rate limited)
//! POST   /auth/register        - Stage registration, email a code
//! POST   /auth/verify          - Redeem code, create user, issue token
//! POST   /auth/login           - Password login, issue token
//!
//! # Users (bearer token)
//! POST   /users                - Create user directly
//! GET    /users                - List users (?page&limit&search)
//! GET    /users/{id}           - Show user
//! PUT    /users/{id}           - Update own profile
//! DELETE /users/{id}           - Delete own account
//!
//! # Notes (bearer token, owner scoped)
//! POST   /notes                - Create note
//! GET    /notes                - List notes (?page&limit)
//! GET    /notes/{id}           - Show note
//! PUT    /notes/{id}           - Update note
//! DELETE /notes/{id}           - Soft-delete note
//! ```

pub mod auth;
pub mod extract;
pub mod health;
pub mod notes;
pub mod users;

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::middleware::{RateLimiterLayer, require_bearer};
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes(rate_limiter: Option<RateLimiterLayer>) -> Router<AppState> {
    let router = Router::new()
        .route("/register", post(auth::register))
        .route("/verify", post(auth::verify))
        .route("/login", post(auth::login));

    match rate_limiter {
        Some(layer) => router.layer(layer),
        None => router,
    }
}

/// Create the user routes router.
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(users::index).post(users::create))
        .route(
            "/{id}",
            get(users::show).put(users::update).delete(users::destroy),
        )
}

/// Create the note routes router.
pub fn note_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(notes::index).post(notes::create))
        .route(
            "/{id}",
            get(notes::show).put(notes::update).delete(notes::destroy),
        )
}

/// Create all API routes.
pub fn routes(state: &AppState, rate_limiter: Option<RateLimiterLayer>) -> Router<AppState> {
    let protected = Router::new()
        .nest("/users", user_routes())
        .nest("/notes", note_routes())
        .route_layer(middleware::from_fn_with_state(state.clone(), require_bearer));

    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/auth", auth_routes(rate_limiter))
        .merge(protected)
}
