//! Authentication workflow types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use notekeeper_core::{Email, UserId};

use super::user::User;

/// `POST /auth/register` body.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

/// `POST /auth/verify` body.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyRequest {
    pub email: String,
    pub code: String,
}

/// `POST /auth/login` body.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// An unverified registration staged in the ephemeral cache.
///
/// Stored as JSON under `user_<email>` until it is verified or expires. It is
/// never written to durable storage directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRegistration {
    pub first_name: String,
    pub last_name: String,
    pub email: Email,
    /// Argon2id PHC string.
    pub password_hash: String,
}

/// Profile plus session token returned by verify and login.
#[derive(Debug, Clone, Serialize)]
pub struct AuthResponse {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: Email,
    pub created_at: DateTime<Utc>,
    pub access_token: String,
}

impl AuthResponse {
    #[must_use]
    pub fn new(user: User, access_token: String) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            created_at: user.created_at,
            access_token,
        }
    }
}

/// Identity attached to a request after its bearer token verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthPayload {
    pub user_id: UserId,
    pub email: Email,
}

/// Plain acknowledgement body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
