//! Integration tests for Notekeeper.
//!
//! # Running Tests
//!
//! ```bash
//! # Migrate, then start the server against the same database
//! cargo run -p notekeeper-cli -- migrate
//! cargo run -p notekeeper-server
//!
//! # Run the ignored tests
//! cargo test -p notekeeper-integration-tests -- --ignored
//! ```
//!
//! Tests talk to the server over HTTP (`NOTEKEEPER_BASE_URL`, default
//! `http://localhost:8000`). Verification codes never leave the server, so
//! fixtures that need a logged-in user seed it directly in the database.

use reqwest::Client;
use secrecy::ExposeSecret;
use serde_json::{Value, json};
use sqlx::PgPool;

use notekeeper_core::Email;
use notekeeper_server::config::database_url_from_env;
use notekeeper_server::db::{PgUserRepository, UserStore};
use notekeeper_server::models::NewUser;
use notekeeper_server::services::auth::hash_password;

/// Password given to every seeded user.
pub const TEST_PASSWORD: &str = "integration";

/// Base URL of the server under test.
#[must_use]
pub fn base_url() -> String {
    std::env::var("NOTEKEEPER_BASE_URL").unwrap_or_else(|_| "http://localhost:8000".to_string())
}

/// A fresh address that no other test run has used.
#[must_use]
pub fn unique_email() -> String {
    format!("it-{}@example.com", uuid::Uuid::new_v4().simple())
}

/// HTTP client plus direct database access.
pub struct TestContext {
    pub client: Client,
    pub base_url: String,
    pub pool: PgPool,
}

/// A seeded user holding a bearer token.
pub struct LoggedIn {
    pub id: i64,
    pub email: String,
    pub token: String,
}

impl TestContext {
    /// Connect using `DATABASE_URL` (or the `POSTGRES_*` variables).
    ///
    /// # Panics
    ///
    /// Panics if the database is unreachable.
    pub async fn new() -> Self {
        let database_url = database_url_from_env().expect("DATABASE_URL not set");
        let pool = PgPool::connect(database_url.expose_secret())
            .await
            .expect("Failed to connect to database");

        Self {
            client: Client::new(),
            base_url: base_url(),
            pool,
        }
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Insert a user with [`TEST_PASSWORD`] and log in over HTTP.
    ///
    /// # Panics
    ///
    /// Panics if seeding or login fails.
    pub async fn logged_in_user(&self) -> LoggedIn {
        let email = unique_email();
        PgUserRepository::new(self.pool.clone())
            .create(NewUser {
                first_name: "Integration".to_string(),
                last_name: "Tester".to_string(),
                email: Email::parse(&email).expect("valid email"),
                password_hash: Some(hash_password(TEST_PASSWORD).expect("hash")),
                phone_number: None,
                image_url: None,
            })
            .await
            .expect("Failed to seed user");

        let body: Value = self
            .client
            .post(self.url("/auth/login"))
            .json(&json!({ "email": email, "password": TEST_PASSWORD }))
            .send()
            .await
            .expect("Failed to log in")
            .json()
            .await
            .expect("Invalid login response");

        LoggedIn {
            id: body["id"].as_i64().expect("id"),
            email,
            token: body["access_token"]
                .as_str()
                .expect("access_token")
                .to_string(),
        }
    }
}
