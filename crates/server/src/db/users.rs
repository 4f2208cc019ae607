//! User repository for database operations.
//!
//! Queries are checked at runtime with `sqlx::query_as` so the crate builds
//! without a live database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use notekeeper_core::{Email, UserId};

use super::{RepositoryError, map_unique_violation, page_bounds};
use crate::models::{Listing, NewUser, PageRequest, User, UserUpdate};

/// Filters for listing users.
#[derive(Debug, Clone, Default)]
pub struct UserListParams {
    pub page: PageRequest,
    /// Case-insensitive substring matched against names, email and phone.
    pub search: Option<String>,
}

/// Credential store: durable users keyed by unique email.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Get a user by their email address.
    async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError>;

    /// Get a user together with their password hash.
    ///
    /// Returns `None` if the user doesn't exist or has no password set.
    async fn get_credentials(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError>;

    /// Get a user by their ID.
    async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError>;

    /// Insert a user; the store assigns `id` and `created_at`.
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    async fn create(&self, user: NewUser) -> Result<User, RepositoryError>;

    /// List users newest first.
    async fn list(&self, params: &UserListParams) -> Result<Listing<User>, RepositoryError>;

    /// Replace a user's profile fields. Returns `None` if the user doesn't exist.
    async fn update(&self, id: UserId, update: UserUpdate)
    -> Result<Option<User>, RepositoryError>;

    /// Delete a user and (by cascade) their notes.
    ///
    /// Returns `true` if the user was deleted, `false` if it didn't exist.
    async fn delete(&self, id: UserId) -> Result<bool, RepositoryError>;

    /// Check that the backing store is reachable.
    async fn ping(&self) -> Result<(), RepositoryError>;
}

/// Row shape shared by every user query.
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: UserId,
    first_name: String,
    last_name: String,
    email: Email,
    phone_number: Option<String>,
    image_url: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        Self {
            id: r.id,
            first_name: r.first_name,
            last_name: r.last_name,
            email: r.email,
            phone_number: r.phone_number,
            image_url: r.image_url,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CredentialRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: Option<String>,
}

const USER_COLUMNS: &str = "id, first_name, last_name, email, phone_number, image_url, created_at";

/// `PostgreSQL` implementation of [`UserStore`].
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserRepository {
    async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    async fn get_credentials(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let row = sqlx::query_as::<_, CredentialRow>(&format!(
            "SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        let Some(r) = row else {
            return Ok(None);
        };

        let Some(password_hash) = r.password_hash else {
            return Ok(None);
        };

        Ok(Some((r.user.into(), password_hash)))
    }

    async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    async fn create(&self, user: NewUser) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r"
            INSERT INTO users (first_name, last_name, email, password_hash, phone_number, image_url)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(user.password_hash.as_deref())
        .bind(user.phone_number.as_deref())
        .bind(user.image_url.as_deref())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "email"))?;

        Ok(row.into())
    }

    async fn list(&self, params: &UserListParams) -> Result<Listing<User>, RepositoryError> {
        let (limit, offset) = page_bounds(params.page)?;
        let pattern = params
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", escape_like(s)));

        let filter = r"
            WHERE $1::TEXT IS NULL
               OR first_name ILIKE $1
               OR last_name ILIKE $1
               OR email ILIKE $1
               OR phone_number ILIKE $1
        ";

        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users {filter} ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
        ))
        .bind(pattern.as_deref())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM users {filter}"))
            .bind(pattern.as_deref())
            .fetch_one(&self.pool)
            .await?;

        Ok(Listing {
            items: rows.into_iter().map(User::from).collect(),
            count,
        })
    }

    async fn update(
        &self,
        id: UserId,
        update: UserUpdate,
    ) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r"
            UPDATE users
            SET first_name = $1, last_name = $2, email = $3, phone_number = $4, image_url = $5
            WHERE id = $6
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(&update.first_name)
        .bind(&update.last_name)
        .bind(&update.email)
        .bind(update.phone_number.as_deref())
        .bind(update.image_url.as_deref())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "email"))?;

        Ok(row.map(User::from))
    }

    async fn delete(&self, id: UserId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Escape `ILIKE` wildcards in user-supplied search text.
fn escape_like(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("ann"), "ann");
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }
}
