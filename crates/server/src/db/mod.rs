//! Durable storage for users and notes.
//!
//! # Database
//!
//! ## Tables
//!
//! - `users` - Verified and operator-created users (unique email)
//! - `notes` - Personal notes, soft-deleted via `deleted_at`
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p notekeeper-cli -- migrate
//! ```
//!
//! Handlers and services talk to the [`UserStore`] and [`NoteStore`] traits;
//! the `Pg*` repositories are the production implementations.

pub mod notes;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use notes::{NoteStore, PgNoteRepository};
pub use users::{PgUserRepository, UserListParams, UserStore};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Map a unique-index violation to `Conflict`, everything else to `Database`.
pub(crate) fn map_unique_violation(e: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(format!("{what} already exists"));
    }
    RepositoryError::Database(e)
}

/// Convert a page offset/limit pair to the `BIGINT` values Postgres expects.
pub(crate) fn page_bounds(page: crate::models::PageRequest) -> Result<(i64, i64), RepositoryError> {
    let offset = i64::try_from(page.offset())
        .map_err(|_| RepositoryError::DataCorruption("page offset overflow".to_owned()))?;
    Ok((i64::from(page.limit()), offset))
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
