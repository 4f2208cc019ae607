//! Notekeeper HTTP service library.
//!
//! Email-verified registration, token authentication and personal notes.
//! The binary in `main.rs` wires configuration, tracing and Sentry around
//! [`build_router`]; tests drive the same router with in-memory stores.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod validation;

#[cfg(test)]
pub(crate) mod testing;

use axum::{Router, body::Body, http::Request, middleware::from_fn};
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::middleware::{RateLimiterLayer, request_id_middleware};
use crate::state::AppState;

/// Build the full application router.
///
/// `rate_limiter` guards the `/auth` routes; the binary passes
/// [`middleware::auth_rate_limiter`], tests pass `None`.
pub fn build_router(state: AppState, rate_limiter: Option<RateLimiterLayer>) -> Router {
    let media_dir = state.config().media_dir.clone();

    routes::routes(&state, rate_limiter)
        .nest_service("/media", ServeDir::new(media_dir))
        .with_state(state)
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                    user_id = tracing::field::Empty,
                )
            }),
        )
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}
