//! User domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use notekeeper_core::{Email, UserId};

/// A durable, verified (or operator-created) user.
///
/// The password hash never leaves the repository layer on this type; login
/// reads it separately through `UserStore::get_credentials`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    /// Unique user ID, assigned by the store.
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    /// Unique, normalized email address.
    pub email: Email,
    pub phone_number: Option<String>,
    pub image_url: Option<String>,
    /// When the user was created, assigned by the store.
    pub created_at: DateTime<Utc>,
}

/// Fields for inserting a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: Email,
    /// Argon2id PHC string. `None` for users created directly by an operator.
    pub password_hash: Option<String>,
    pub phone_number: Option<String>,
    pub image_url: Option<String>,
}

/// Replacement profile fields for an existing user.
#[derive(Debug, Clone)]
pub struct UserUpdate {
    pub first_name: String,
    pub last_name: String,
    pub email: Email,
    pub phone_number: Option<String>,
    pub image_url: Option<String>,
}
