//! Authentication error types.

use thiserror::Error;

use crate::cache::CacheError;
use crate::db::RepositoryError;
use crate::services::token::TokenError;
use crate::validation::ValidationError;

/// Errors that can occur during registration, verification and login.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] notekeeper_core::EmailError),

    /// A name or password field failed validation.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// A durable user already has this email.
    #[error("email already registered")]
    DuplicateEmail,

    /// Nothing staged for this email: never registered, or the staged
    /// record expired.
    #[error("registration not found")]
    RegistrationNotFound,

    /// The staged record exists but its code has expired.
    #[error("verification code expired")]
    CodeExpired,

    /// The supplied code doesn't match the staged one.
    #[error("incorrect verification code")]
    IncorrectCode,

    /// Unknown email, no password set, or wrong password.
    #[error("wrong email or password")]
    WrongCredentials,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Ephemeral cache error.
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,

    /// Token could not be issued.
    #[error("token error: {0}")]
    Token(#[from] TokenError),
}
