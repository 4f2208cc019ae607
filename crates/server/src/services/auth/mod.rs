//! Registration, email verification and password login.
//!
//! # Flow
//!
//! ```text
//! Unregistered --register--> Pending --verify--> Verified
//!       ^                       |
//!       +------- expiry --------+
//! ```
//!
//! Register stages the unconfirmed user under `user_<email>` and a one-time
//! code under `register_code_<email>`, each with its own TTL, then mails the
//! code from a detached task. Verify redeems both entries, persists the user
//! and issues a session token. Login checks the durable password hash.

mod error;

pub use error::AuthError;

use std::sync::Arc;
use std::time::Duration;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use rand::Rng;

use notekeeper_core::Email;

use crate::cache::{self, EphemeralCache};
use crate::config::AuthConfig;
use crate::db::UserStore;
use crate::models::{
    AuthResponse, LoginRequest, MessageResponse, NewUser, PendingRegistration, RegisterRequest,
    VerifyRequest,
};
use crate::services::notifier::{Notification, Notifier, RetryPolicy, send_with_retry};
use crate::services::token::TokenIssuer;
use crate::validation;

/// Response message once a code has been staged.
pub const CODE_SENT_MESSAGE: &str = "Verification code has been sent!";

/// Cache key for a staged registration.
#[must_use]
pub fn pending_key(email: &Email) -> String {
    format!("user_{email}")
}

/// Cache key for a staged verification code.
#[must_use]
pub fn code_key(email: &Email) -> String {
    format!("register_code_{email}")
}

/// Lifetimes and sizes used by the workflow.
#[derive(Debug, Clone, Copy)]
pub struct AuthSettings {
    pub pending_registration_ttl: Duration,
    pub verification_code_ttl: Duration,
    pub verification_code_length: usize,
    pub notify_retry: RetryPolicy,
}

impl AuthSettings {
    #[must_use]
    pub fn from_config(config: &AuthConfig) -> Self {
        Self {
            pending_registration_ttl: config.pending_registration_ttl,
            verification_code_ttl: config.verification_code_ttl,
            verification_code_length: config.verification_code_length,
            notify_retry: RetryPolicy::default(),
        }
    }
}

/// Authentication service.
///
/// Cheap to clone; every collaborator is shared.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    cache: Arc<dyn EphemeralCache>,
    notifier: Arc<dyn Notifier>,
    tokens: TokenIssuer,
    settings: AuthSettings,
}

impl AuthService {
    /// Create a new authentication service.
    #[must_use]
    pub fn new(
        users: Arc<dyn UserStore>,
        cache: Arc<dyn EphemeralCache>,
        notifier: Arc<dyn Notifier>,
        tokens: TokenIssuer,
        settings: AuthSettings,
    ) -> Self {
        Self {
            users,
            cache,
            notifier,
            tokens,
            settings,
        }
    }

    /// Token issuer shared with the bearer middleware.
    #[must_use]
    pub const fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    /// Stage a registration and send its verification code.
    ///
    /// Both cache entries are written before this returns; the email itself
    /// goes out on a detached task and never fails the call.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` or `AuthError::InvalidEmail` for bad
    /// input, `AuthError::DuplicateEmail` if the email is already registered,
    /// and storage errors otherwise.
    pub async fn register(&self, req: RegisterRequest) -> Result<MessageResponse, AuthError> {
        let first_name = validation::name("first_name", &req.first_name)?;
        let last_name = validation::name("last_name", &req.last_name)?;
        let email = Email::parse(&req.email)?;
        validation::password(&req.password)?;

        if self.users.get_by_email(&email).await?.is_some() {
            return Err(AuthError::DuplicateEmail);
        }

        let password_hash = hash_password_blocking(req.password).await?;

        let pending = PendingRegistration {
            first_name,
            last_name,
            email: email.clone(),
            password_hash,
        };
        cache::set_json(
            self.cache.as_ref(),
            &pending_key(&email),
            &pending,
            self.settings.pending_registration_ttl,
        )
        .await?;

        let code = generate_code(self.settings.verification_code_length);
        self.cache
            .set(
                &code_key(&email),
                code.clone(),
                self.settings.verification_code_ttl,
            )
            .await?;

        tracing::info!(email = %email, "Registration staged");

        self.dispatch_code(email, code);

        Ok(MessageResponse::new(CODE_SENT_MESSAGE))
    }

    /// Redeem a verification code and create the durable user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::RegistrationNotFound` if nothing is staged,
    /// `AuthError::CodeExpired` if the code is gone, and
    /// `AuthError::IncorrectCode` if it doesn't match.
    pub async fn verify(&self, req: VerifyRequest) -> Result<AuthResponse, AuthError> {
        let email = Email::parse(&req.email)?;

        let pending: PendingRegistration =
            cache::get_json(self.cache.as_ref(), &pending_key(&email))
                .await?
                .ok_or(AuthError::RegistrationNotFound)?;

        let staged_code = self
            .cache
            .get(&code_key(&email))
            .await?
            .ok_or(AuthError::CodeExpired)?;

        if !constant_time_compare(&staged_code, &req.code) {
            tracing::debug!(email = %email, "Verification code mismatch");
            return Err(AuthError::IncorrectCode);
        }

        let user = self
            .users
            .create(NewUser {
                first_name: pending.first_name,
                last_name: pending.last_name,
                email: pending.email,
                password_hash: Some(pending.password_hash),
                phone_number: None,
                image_url: None,
            })
            .await?;

        self.discard_staged(&email).await;

        let token = self.tokens.issue(user.id, &user.email)?;

        tracing::info!(user_id = %user.id, "Registration verified");

        Ok(AuthResponse::new(user, token.token))
    }

    /// Check credentials and issue a session token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::WrongCredentials` for an unknown email, a user
    /// without a password, or a wrong password.
    pub async fn login(&self, req: LoginRequest) -> Result<AuthResponse, AuthError> {
        let email = Email::parse(&req.email)?;

        let (user, password_hash) = self
            .users
            .get_credentials(&email)
            .await?
            .ok_or(AuthError::WrongCredentials)?;

        verify_password_blocking(req.password, password_hash).await?;

        let token = self.tokens.issue(user.id, &user.email)?;

        tracing::info!(user_id = %user.id, "User logged in");

        Ok(AuthResponse::new(user, token.token))
    }

    /// Send the code on a detached task; failures are only logged.
    fn dispatch_code(&self, email: Email, code: String) {
        let notifier = Arc::clone(&self.notifier);
        let policy = self.settings.notify_retry;

        tokio::spawn(async move {
            let notification = Notification::verification_code(email, &code);
            if let Err(e) = send_with_retry(notifier.as_ref(), &notification, policy).await {
                tracing::error!(
                    to = ?notification.to,
                    error = %e,
                    "Failed to send verification code"
                );
            }
        });
    }

    /// Remove both staged entries after a successful verify.
    async fn discard_staged(&self, email: &Email) {
        for key in [pending_key(email), code_key(email)] {
            if let Err(e) = self.cache.delete(&key).await {
                tracing::warn!(key = %key, error = %e, "Failed to discard staged entry");
            }
        }
    }
}

/// Generate a numeric code of `len` digits. Leading zeros are allowed.
#[must_use]
pub fn generate_code(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::WrongCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::WrongCredentials)
}

/// [`hash_password`] on the blocking pool, off the async workers.
async fn hash_password_blocking(password: String) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Password hashing task failed");
            AuthError::PasswordHash
        })?
}

/// [`verify_password`] on the blocking pool.
async fn verify_password_blocking(password: String, hash: String) -> Result<(), AuthError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Password verification task failed");
            AuthError::PasswordHash
        })?
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::TimeDelta;
    use secrecy::SecretString;

    use super::*;
    use crate::db::RepositoryError;
    use crate::testing::{FailingNotifier, FakeCache, FakeUserStore, RecordingNotifier};

    struct Harness {
        service: AuthService,
        cache: Arc<FakeCache>,
        users: Arc<FakeUserStore>,
        sent: tokio::sync::mpsc::UnboundedReceiver<Notification>,
    }

    fn settings() -> AuthSettings {
        AuthSettings {
            pending_registration_ttl: Duration::from_secs(600),
            verification_code_ttl: Duration::from_secs(60),
            verification_code_length: 6,
            notify_retry: RetryPolicy {
                attempts: 3,
                initial_backoff: Duration::from_millis(1),
            },
        }
    }

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(
            SecretString::from("k7Qz!p2Vw9#rT4mX8&bN1cL6yH3sJ5dF"),
            TimeDelta::hours(24),
        )
    }

    fn harness() -> Harness {
        let cache = Arc::new(FakeCache::default());
        let users = Arc::new(FakeUserStore::default());
        let (notifier, sent) = RecordingNotifier::new();
        let service = AuthService::new(
            users.clone(),
            cache.clone(),
            Arc::new(notifier),
            issuer(),
            settings(),
        );
        Harness {
            service,
            cache,
            users,
            sent,
        }
    }

    fn register_req(email: &str) -> RegisterRequest {
        RegisterRequest {
            first_name: "Ada".to_owned(),
            last_name: "Lovelace".to_owned(),
            email: email.to_owned(),
            password: "analytical".to_owned(),
        }
    }

    fn verify_req(email: &str, code: &str) -> VerifyRequest {
        VerifyRequest {
            email: email.to_owned(),
            code: code.to_owned(),
        }
    }

    fn login_req(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.to_owned(),
            password: password.to_owned(),
        }
    }

    fn parse(email: &str) -> Email {
        Email::parse(email).expect("valid email")
    }

    async fn staged_code(cache: &FakeCache, email: &str) -> String {
        cache
            .get(&code_key(&parse(email)))
            .await
            .expect("cache get")
            .expect("code staged")
    }

    /// A code guaranteed to differ from `code`.
    fn wrong(code: &str) -> String {
        code.chars()
            .map(|c| if c == '0' { '1' } else { '0' })
            .collect()
    }

    #[tokio::test]
    async fn test_register_stages_record_and_code() {
        let mut h = harness();

        let response = h
            .service
            .register(register_req("a@x.com"))
            .await
            .expect("register");
        assert_eq!(response.message, CODE_SENT_MESSAGE);

        let email = parse("a@x.com");
        assert_eq!(
            h.cache.ttl(&pending_key(&email)),
            Some(Duration::from_secs(600))
        );
        assert_eq!(h.cache.ttl(&code_key(&email)), Some(Duration::from_secs(60)));

        let pending: PendingRegistration = cache::get_json(h.cache.as_ref(), &pending_key(&email))
            .await
            .expect("get_json")
            .expect("staged");
        assert_eq!(pending.email, email);
        assert_ne!(pending.password_hash, "analytical");
        assert!(pending.password_hash.starts_with("$argon2id$"));

        let code = staged_code(&h.cache, "a@x.com").await;
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));

        // Nothing durable yet
        assert!(h.users.get_by_email(&email).await.expect("lookup").is_none());

        let sent = tokio::time::timeout(Duration::from_secs(1), h.sent.recv())
            .await
            .expect("notification dispatched")
            .expect("channel open");
        assert_eq!(sent.to, vec![email]);
        assert_eq!(sent.params.get("code"), Some(&code));
    }

    #[tokio::test]
    async fn test_register_then_verify_once() {
        let h = harness();
        h.service
            .register(register_req("a@x.com"))
            .await
            .expect("register");
        let code = staged_code(&h.cache, "a@x.com").await;

        let auth = h
            .service
            .verify(verify_req("a@x.com", &code))
            .await
            .expect("verify");
        assert_ne!(auth.id.as_i64(), 0);
        assert_eq!(auth.email, parse("a@x.com"));
        assert_eq!(auth.first_name, "Ada");

        let claims = h
            .service
            .tokens()
            .verify(&auth.access_token)
            .expect("usable token");
        assert_eq!(claims.user_id, auth.id);
        assert_eq!(claims.email, auth.email);

        let stored = h
            .users
            .get_by_email(&parse("a@x.com"))
            .await
            .expect("lookup")
            .expect("durable user");
        assert_eq!(stored.id, auth.id);

        // Second redemption finds nothing staged
        let again = h.service.verify(verify_req("a@x.com", &code)).await;
        assert!(matches!(again, Err(AuthError::RegistrationNotFound)));
        assert_eq!(h.users.len(), 1);
    }

    #[tokio::test]
    async fn test_verify_wrong_code_repeatedly() {
        let h = harness();
        h.service
            .register(register_req("a@x.com"))
            .await
            .expect("register");
        let code = staged_code(&h.cache, "a@x.com").await;
        let bad = wrong(&code);

        for _ in 0..5 {
            let result = h.service.verify(verify_req("a@x.com", &bad)).await;
            assert!(matches!(result, Err(AuthError::IncorrectCode)));
        }
        assert_eq!(h.users.len(), 0);

        // Exact match only
        let padded = format!(" {code} ");
        let result = h.service.verify(verify_req("a@x.com", &padded)).await;
        assert!(matches!(result, Err(AuthError::IncorrectCode)));

        // The right code still works afterwards
        h.service
            .verify(verify_req("a@x.com", &code))
            .await
            .expect("verify");
    }

    #[tokio::test]
    async fn test_verify_after_code_expiry() {
        let h = harness();
        h.service
            .register(register_req("b@x.com"))
            .await
            .expect("register");
        let code = staged_code(&h.cache, "b@x.com").await;

        h.cache.expire(&code_key(&parse("b@x.com")));

        let result = h.service.verify(verify_req("b@x.com", &code)).await;
        assert!(matches!(result, Err(AuthError::CodeExpired)));
        assert_eq!(h.users.len(), 0);
    }

    #[tokio::test]
    async fn test_verify_after_record_expiry() {
        let h = harness();
        h.service
            .register(register_req("b@x.com"))
            .await
            .expect("register");
        let code = staged_code(&h.cache, "b@x.com").await;

        h.cache.expire(&pending_key(&parse("b@x.com")));

        let result = h.service.verify(verify_req("b@x.com", &code)).await;
        assert!(matches!(result, Err(AuthError::RegistrationNotFound)));
    }

    #[tokio::test]
    async fn test_verify_never_registered() {
        let h = harness();
        let result = h.service.verify(verify_req("nobody@x.com", "123456")).await;
        assert!(matches!(result, Err(AuthError::RegistrationNotFound)));
    }

    #[tokio::test]
    async fn test_reregister_overwrites_staged_code() {
        let h = harness();
        h.service
            .register(register_req("a@x.com"))
            .await
            .expect("register");
        let first = staged_code(&h.cache, "a@x.com").await;

        // Force the second registration to produce a different code
        let mut second = first.clone();
        while second == first {
            let mut req = register_req("a@x.com");
            req.first_name = "Augusta".to_owned();
            h.service.register(req).await.expect("re-register");
            second = staged_code(&h.cache, "a@x.com").await;
        }

        let result = h.service.verify(verify_req("a@x.com", &first)).await;
        assert!(matches!(result, Err(AuthError::IncorrectCode)));

        let auth = h
            .service
            .verify(verify_req("a@x.com", &second))
            .await
            .expect("verify with latest code");
        assert_eq!(auth.first_name, "Augusta");
    }

    #[tokio::test]
    async fn test_register_duplicate_email() {
        let h = harness();
        h.service
            .register(register_req("a@x.com"))
            .await
            .expect("register");
        let code = staged_code(&h.cache, "a@x.com").await;
        h.service
            .verify(verify_req("a@x.com", &code))
            .await
            .expect("verify");

        let result = h.service.register(register_req("A@X.com")).await;
        assert!(matches!(result, Err(AuthError::DuplicateEmail)));
    }

    #[tokio::test]
    async fn test_register_validation() {
        let h = harness();

        let mut req = register_req("a@x.com");
        req.first_name = "A".to_owned();
        assert!(matches!(
            h.service.register(req).await,
            Err(AuthError::Validation(_))
        ));

        let mut req = register_req("a@x.com");
        req.password = "short".to_owned();
        assert!(matches!(
            h.service.register(req).await,
            Err(AuthError::Validation(_))
        ));

        let req = register_req("not-an-email");
        assert!(matches!(
            h.service.register(req).await,
            Err(AuthError::InvalidEmail(_))
        ));

        // Nothing was staged
        assert!(h.cache.is_empty());
    }

    #[tokio::test]
    async fn test_notifier_failure_does_not_fail_register() {
        let cache = Arc::new(FakeCache::default());
        let notifier = Arc::new(FailingNotifier::default());
        let service = AuthService::new(
            Arc::new(FakeUserStore::default()),
            cache.clone(),
            notifier.clone(),
            issuer(),
            settings(),
        );

        service
            .register(register_req("a@x.com"))
            .await
            .expect("register succeeds despite mail failure");
        assert!(cache.ttl(&code_key(&parse("a@x.com"))).is_some());

        // Detached task retries up to the policy limit
        tokio::time::timeout(Duration::from_secs(1), async {
            while notifier.calls() < 3 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("all attempts made");
    }

    #[tokio::test]
    async fn test_verify_store_conflict_is_internal() {
        let h = harness();
        h.service
            .register(register_req("a@x.com"))
            .await
            .expect("register");
        let code = staged_code(&h.cache, "a@x.com").await;

        // Someone else claims the email through the direct path meanwhile
        h.users
            .create(NewUser {
                first_name: "Other".to_owned(),
                last_name: "Person".to_owned(),
                email: parse("a@x.com"),
                password_hash: None,
                phone_number: None,
                image_url: None,
            })
            .await
            .expect("direct create");

        let result = h.service.verify(verify_req("a@x.com", &code)).await;
        assert!(matches!(
            result,
            Err(AuthError::Repository(RepositoryError::Conflict(_)))
        ));
    }

    async fn verified_user(h: &Harness, email: &str) {
        h.service.register(register_req(email)).await.expect("register");
        let code = staged_code(&h.cache, email).await;
        h.service
            .verify(verify_req(email, &code))
            .await
            .expect("verify");
    }

    #[tokio::test]
    async fn test_login_success() {
        let h = harness();
        verified_user(&h, "a@x.com").await;

        let auth = h
            .service
            .login(login_req("a@x.com", "analytical"))
            .await
            .expect("login");
        let claims = h.service.tokens().verify(&auth.access_token).expect("token");
        assert_eq!(claims.email, parse("a@x.com"));
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let h = harness();
        verified_user(&h, "a@x.com").await;

        let wrong_password = h
            .service
            .login(login_req("a@x.com", "not-it"))
            .await
            .expect_err("wrong password");
        let unknown = h
            .service
            .login(login_req("ghost@x.com", "analytical"))
            .await
            .expect_err("unknown email");

        assert!(matches!(wrong_password, AuthError::WrongCredentials));
        assert!(matches!(unknown, AuthError::WrongCredentials));
        assert_eq!(wrong_password.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn test_login_user_without_password() {
        let h = harness();
        h.users
            .create(NewUser {
                first_name: "Direct".to_owned(),
                last_name: "User".to_owned(),
                email: parse("direct@x.com"),
                password_hash: None,
                phone_number: None,
                image_url: None,
            })
            .await
            .expect("direct create");

        let result = h.service.login(login_req("direct@x.com", "anything")).await;
        assert!(matches!(result, Err(AuthError::WrongCredentials)));
    }

    #[test]
    fn test_generate_code() {
        for len in [4, 6, 10] {
            let code = generate_code(len);
            assert_eq!(code.len(), len);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("123456", "123456"));
        assert!(!constant_time_compare("123456", "123457"));
        assert!(!constant_time_compare("123456", "12345"));
    }

    #[test]
    fn test_password_hash_round_trip() {
        let hash = hash_password("analytical").expect("hash");
        assert!(verify_password("analytical", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong", &hash),
            Err(AuthError::WrongCredentials)
        ));
    }

    #[tokio::test]
    async fn test_blocking_password_helpers() {
        let hash = hash_password_blocking("analytical".to_owned())
            .await
            .expect("hash");
        verify_password_blocking("analytical".to_owned(), hash.clone())
            .await
            .expect("verify");
        assert!(matches!(
            verify_password_blocking("wrong".to_owned(), hash).await,
            Err(AuthError::WrongCredentials)
        ));
    }
}
