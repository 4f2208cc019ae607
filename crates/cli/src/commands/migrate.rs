//! Database migration command.
//!
//! Applies every pending migration from `crates/server/migrations/` to the
//! database named by `DATABASE_URL` (or the `POSTGRES_*` variables).

use secrecy::ExposeSecret;
use sqlx::PgPool;
use thiserror::Error;

use notekeeper_server::config::{ConfigError, database_url_from_env};

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run all pending migrations.
pub async fn run() -> Result<(), MigrationError> {
    dotenvy::dotenv().ok();

    let database_url = database_url_from_env()?;

    tracing::info!("Connecting to database...");
    let pool = PgPool::connect(database_url.expose_secret()).await?;

    tracing::info!("Running migrations...");
    sqlx::migrate!("../server/migrations").run(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
