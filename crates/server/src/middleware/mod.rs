//! HTTP middleware stack.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, HTTP transaction)
//! 2. `TraceLayer` (request span with `request_id` and `user_id` fields)
//! 3. Request ID (add unique ID to each request)
//! 4. Rate limiting on `/auth/*` (governor, production router only)
//! 5. Bearer auth on `/users` and `/notes`

pub mod auth;
pub mod rate_limit;
pub mod request_id;

pub use auth::{CurrentUser, require_bearer};
pub use rate_limit::{RateLimiterLayer, auth_rate_limiter};
pub use request_id::request_id_middleware;
