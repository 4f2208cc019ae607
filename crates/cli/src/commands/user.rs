//! User management commands.
//!
//! Creates verified users directly in the database, bypassing the email
//! code flow. Useful for seeding a fresh environment.

use secrecy::ExposeSecret;
use sqlx::PgPool;
use thiserror::Error;

use notekeeper_core::{Email, EmailError, UserId};
use notekeeper_server::config::{ConfigError, database_url_from_env};
use notekeeper_server::db::{PgUserRepository, RepositoryError, UserStore};
use notekeeper_server::models::NewUser;
use notekeeper_server::services::auth::{AuthError, hash_password};
use notekeeper_server::validation::{self, ValidationError};

/// Errors that can occur during user operations.
#[derive(Debug, Error)]
pub enum UserError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("User already exists with email: {0}")]
    UserExists(String),

    #[error(transparent)]
    Repository(RepositoryError),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Fields for a user created from the command line.
pub struct CreateUser<'a> {
    pub email: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    /// Without a password the user can only be reached through the API.
    pub password: Option<&'a str>,
}

/// Create a user and return its ID.
pub async fn create(args: CreateUser<'_>) -> Result<UserId, UserError> {
    dotenvy::dotenv().ok();

    let email = Email::parse(args.email)?;
    let first_name = validation::name("first_name", args.first_name)?;
    let last_name = validation::name("last_name", args.last_name)?;
    let password_hash = match args.password {
        Some(password) => {
            validation::password(password)?;
            Some(hash_password(password)?)
        }
        None => None,
    };

    let database_url = database_url_from_env()?;

    tracing::info!("Connecting to database...");
    let pool = PgPool::connect(database_url.expose_secret()).await?;
    let users = PgUserRepository::new(pool);

    tracing::info!("Creating user: {}", email);
    let user = users
        .create(NewUser {
            first_name,
            last_name,
            email: email.clone(),
            password_hash,
            phone_number: None,
            image_url: None,
        })
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict(_) => UserError::UserExists(email.to_string()),
            other => UserError::Repository(other),
        })?;

    tracing::info!(user_id = %user.id, "User created");
    Ok(user.id)
}
