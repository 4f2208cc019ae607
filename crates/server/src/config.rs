//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `AUTH_SECRET_KEY` - Session token signing secret (min 32 chars, high entropy)
//! - `DATABASE_URL` - `PostgreSQL` connection string, or all of
//!   `POSTGRES_HOST`, `POSTGRES_PORT`, `POSTGRES_USER`, `POSTGRES_PASSWORD`,
//!   `POSTGRES_DATABASE`
//!
//! ## Optional
//! - `HTTP_HOST` - Bind address (default: 127.0.0.1)
//! - `HTTP_PORT` - Listen port (default: 8000)
//! - `ACCESS_TOKEN_TTL_HOURS` - Session token lifetime (default: 24)
//! - `PENDING_REGISTRATION_TTL_SECS` - Unverified registration lifetime (default: 600)
//! - `VERIFICATION_CODE_TTL_SECS` - One-time code lifetime (default: 60)
//! - `VERIFICATION_CODE_LENGTH` - Digits per one-time code (default: 6, range 4-10)
//! - `CACHE_MAX_CAPACITY` - Maximum entries in the ephemeral cache (default: 10000)
//! - `SMTP_HOST`, `SMTP_PORT`, `SMTP_USERNAME`, `SMTP_PASSWORD`, `SMTP_FROM` -
//!   Outbound mail. When `SMTP_HOST` is unset, codes are logged instead of sent.
//! - `MEDIA_DIR` - Directory served under `/media` (default: ./media)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`, `SENTRY_TRACES_SAMPLE_RATE`

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use chrono::TimeDelta;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_AUTH_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const MIN_CODE_LENGTH: usize = 4;
const MAX_CODE_LENGTH: usize = 10;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Server application configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Registration, verification and token settings
    pub auth: AuthConfig,
    /// Ephemeral cache settings
    pub cache: CacheConfig,
    /// Outbound mail settings; `None` logs notifications instead
    pub email: Option<EmailConfig>,
    /// Directory served under `/media`
    pub media_dir: PathBuf,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
}

/// Authentication workflow configuration.
///
/// Implements `Debug` manually to redact the signing secret.
#[derive(Clone)]
pub struct AuthConfig {
    /// HMAC key for session tokens
    pub secret_key: SecretString,
    /// Session token lifetime
    pub access_token_ttl: TimeDelta,
    /// How long an unverified registration stays staged
    pub pending_registration_ttl: Duration,
    /// How long a one-time code stays valid
    pub verification_code_ttl: Duration,
    /// Number of digits in a one-time code
    pub verification_code_length: usize,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret_key", &"[REDACTED]")
            .field("access_token_ttl", &self.access_token_ttl)
            .field("pending_registration_ttl", &self.pending_registration_ttl)
            .field("verification_code_ttl", &self.verification_code_ttl)
            .field("verification_code_length", &self.verification_code_length)
            .finish()
    }
}

/// Ephemeral cache configuration.
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    /// Maximum number of staged entries held at once
    pub max_capacity: u64,
}

/// SMTP configuration for sending verification codes.
///
/// Implements `Debug` manually to redact the SMTP password.
#[derive(Clone)]
pub struct EmailConfig {
    /// SMTP server hostname
    pub smtp_host: String,
    /// SMTP server port
    pub smtp_port: u16,
    /// SMTP authentication username
    pub smtp_username: String,
    /// SMTP authentication password
    pub smtp_password: SecretString,
    /// Email sender address (From header)
    pub from_address: String,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = database_url_from_env()?;
        let host = parse_env_or_default::<IpAddr>("HTTP_HOST", "127.0.0.1")?;
        let port = parse_env_or_default::<u16>("HTTP_PORT", "8000")?;
        let auth = AuthConfig::from_env()?;
        let cache = CacheConfig {
            max_capacity: parse_env_or_default("CACHE_MAX_CAPACITY", "10000")?,
        };
        let email = EmailConfig::from_env()?;
        let media_dir = PathBuf::from(get_env_or_default("MEDIA_DIR", "./media"));
        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.1);

        Ok(Self {
            database_url,
            host,
            port,
            auth,
            cache,
            email,
            media_dir,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl AuthConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let secret_key = get_validated_secret("AUTH_SECRET_KEY")?;
        validate_secret_length(&secret_key, "AUTH_SECRET_KEY")?;

        let token_hours: i64 = parse_env_or_default("ACCESS_TOKEN_TTL_HOURS", "24")?;
        let access_token_ttl = TimeDelta::try_hours(token_hours)
            .filter(|ttl| *ttl > TimeDelta::zero())
            .ok_or_else(|| {
                ConfigError::InvalidEnvVar(
                    "ACCESS_TOKEN_TTL_HOURS".to_string(),
                    "must be a positive number of hours".to_string(),
                )
            })?;

        let pending_registration_ttl =
            positive_secs("PENDING_REGISTRATION_TTL_SECS", "600")?;
        let verification_code_ttl = positive_secs("VERIFICATION_CODE_TTL_SECS", "60")?;

        let verification_code_length: usize =
            parse_env_or_default("VERIFICATION_CODE_LENGTH", "6")?;
        if !(MIN_CODE_LENGTH..=MAX_CODE_LENGTH).contains(&verification_code_length) {
            return Err(ConfigError::InvalidEnvVar(
                "VERIFICATION_CODE_LENGTH".to_string(),
                format!("must be between {MIN_CODE_LENGTH} and {MAX_CODE_LENGTH}"),
            ));
        }

        Ok(Self {
            secret_key,
            access_token_ttl,
            pending_registration_ttl,
            verification_code_ttl,
            verification_code_length,
        })
    }
}

impl EmailConfig {
    /// SMTP is optional as a whole: without `SMTP_HOST` the server logs codes.
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(smtp_host) = get_optional_env("SMTP_HOST") else {
            return Ok(None);
        };

        Ok(Some(Self {
            smtp_host,
            smtp_port: parse_env_or_default("SMTP_PORT", "587")?,
            smtp_username: get_required_env("SMTP_USERNAME")?,
            smtp_password: get_required_secret("SMTP_PASSWORD")?,
            from_address: get_required_env("SMTP_FROM")?,
        }))
    }
}

/// Resolve the database connection string.
///
/// Prefers `DATABASE_URL`; otherwise assembles one from the `POSTGRES_*`
/// variables. Shared with the CLI, which does not need the rest of the config.
///
/// # Errors
///
/// Returns `ConfigError::MissingEnvVar` if neither form is fully present.
pub fn database_url_from_env() -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }

    let host = get_required_env("POSTGRES_HOST")?;
    let port = get_env_or_default("POSTGRES_PORT", "5432");
    let user = get_required_env("POSTGRES_USER")?;
    let password = get_required_secret("POSTGRES_PASSWORD")?;
    let database = get_required_env("POSTGRES_DATABASE")?;

    Ok(SecretString::from(format!(
        "postgres://{}:{}@{host}:{port}/{database}",
        urlencoding::encode(&user),
        urlencoding::encode(password.expose_secret()),
    )))
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse a strictly positive number of seconds.
fn positive_secs(key: &str, default: &str) -> Result<Duration, ConfigError> {
    let secs: u64 = parse_env_or_default(key, default)?;
    if secs == 0 {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be greater than zero".to_string(),
        ));
    }
    Ok(Duration::from_secs(secs))
}

/// Validate that a signing secret meets minimum length requirements.
fn validate_secret_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_AUTH_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_AUTH_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
