//! Business logic services.
//!
//! - `auth` - Registration staging, code verification and password login
//! - `notifier` - Outbound email (SMTP or log-only)
//! - `token` - Signed bearer token issuing and verification

pub mod auth;
pub mod notifier;
pub mod token;
