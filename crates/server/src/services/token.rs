//! Stateless session tokens.
//!
//! A token is `base64url(claims_json) "." base64url(hmac_sha256)` where the
//! MAC covers the encoded claims segment. Nothing is persisted; a token is
//! valid while its signature verifies and `expires_at` is in the future.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, TimeDelta, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use notekeeper_core::{Email, UserId};

use crate::config::AuthConfig;

type HmacSha256 = Hmac<Sha256>;

/// Errors from issuing or verifying a token.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    /// Not two base64url segments, or the claims don't decode.
    #[error("malformed token")]
    Malformed,

    /// The MAC doesn't match the claims.
    #[error("invalid token signature")]
    InvalidSignature,

    /// The token is past its expiry.
    #[error("token expired")]
    Expired,

    /// Claims could not be encoded or the key was rejected.
    #[error("token encoding error: {0}")]
    Encoding(String),
}

/// Signed token contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub user_id: UserId,
    pub email: Email,
    /// Unix seconds.
    pub issued_at: i64,
    /// Unix seconds.
    pub expires_at: i64,
}

/// A freshly issued token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Creates and validates session tokens with a shared secret.
#[derive(Clone)]
pub struct TokenIssuer {
    secret: SecretString,
    ttl: TimeDelta,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("secret", &"[REDACTED]")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl TokenIssuer {
    #[must_use]
    pub const fn new(secret: SecretString, ttl: TimeDelta) -> Self {
        Self { secret, ttl }
    }

    #[must_use]
    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.secret_key.clone(), config.access_token_ttl)
    }

    /// Configured token lifetime.
    #[must_use]
    pub const fn ttl(&self) -> TimeDelta {
        self.ttl
    }

    fn mac(&self) -> Result<HmacSha256, TokenError> {
        HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    /// Issue a token valid for the configured lifetime from now.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Encoding` if the claims cannot be serialized.
    pub fn issue(&self, user_id: UserId, email: &Email) -> Result<IssuedToken, TokenError> {
        self.issue_at(user_id, email, Utc::now(), self.ttl)
    }

    /// Issue a token valid for `ttl` starting at `now`.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Encoding` if the claims cannot be serialized.
    pub fn issue_at(
        &self,
        user_id: UserId,
        email: &Email,
        now: DateTime<Utc>,
        ttl: TimeDelta,
    ) -> Result<IssuedToken, TokenError> {
        let expires_at = now + ttl;
        let claims = TokenClaims {
            user_id,
            email: email.clone(),
            issued_at: now.timestamp(),
            expires_at: expires_at.timestamp(),
        };

        let json = serde_json::to_vec(&claims).map_err(|e| TokenError::Encoding(e.to_string()))?;
        let payload = URL_SAFE_NO_PAD.encode(json);

        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(IssuedToken {
            token: format!("{payload}.{signature}"),
            expires_at,
        })
    }

    /// Verify a token against the current time.
    ///
    /// # Errors
    ///
    /// Returns `TokenError` if the token is malformed, tampered with, or expired.
    pub fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        self.verify_at(token, Utc::now())
    }

    /// Verify a token as of `now`.
    ///
    /// The signature is checked before the claims are parsed.
    ///
    /// # Errors
    ///
    /// Returns `TokenError` if the token is malformed, tampered with, or expired.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<TokenClaims, TokenError> {
        let (payload, signature) = token.split_once('.').ok_or(TokenError::Malformed)?;
        if payload.is_empty() || signature.contains('.') {
            return Err(TokenError::Malformed);
        }

        let json = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| TokenError::Malformed)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| TokenError::Malformed)?;

        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::InvalidSignature)?;

        let claims: TokenClaims =
            serde_json::from_slice(&json).map_err(|_| TokenError::Malformed)?;

        if now.timestamp() >= claims.expires_at {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(
            SecretString::from("k7Qz!p2Vw9#rT4mX8&bN1cL6yH3sJ5dF"),
            TimeDelta::hours(24),
        )
    }

    fn email() -> Email {
        Email::parse("ada@example.com").expect("valid email")
    }

    #[test]
    fn test_round_trip() {
        let issuer = issuer();
        let issued = issuer.issue(UserId::new(7), &email()).expect("issue");

        let claims = issuer.verify(&issued.token).expect("verify");
        assert_eq!(claims.user_id, UserId::new(7));
        assert_eq!(claims.email, email());
        assert_eq!(claims.expires_at, issued.expires_at.timestamp());
        assert_eq!(claims.expires_at - claims.issued_at, 24 * 3600);
    }

    #[test]
    fn test_expiry_boundary() {
        let issuer = issuer();
        let now = Utc::now();
        let issued = issuer
            .issue_at(UserId::new(1), &email(), now, TimeDelta::hours(1))
            .expect("issue");

        assert!(
            issuer
                .verify_at(&issued.token, now + TimeDelta::minutes(59))
                .is_ok()
        );
        assert_eq!(
            issuer.verify_at(&issued.token, now + TimeDelta::hours(1)),
            Err(TokenError::Expired)
        );
        assert_eq!(
            issuer.verify_at(&issued.token, now + TimeDelta::days(2)),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn test_tampered_payload() {
        let issuer = issuer();
        let issued = issuer.issue(UserId::new(1), &email()).expect("issue");
        let (_, signature) = issued.token.split_once('.').expect("two segments");

        // Re-encode claims for another user but keep the original signature
        let forged_claims = TokenClaims {
            user_id: UserId::new(2),
            email: email(),
            issued_at: Utc::now().timestamp(),
            expires_at: Utc::now().timestamp() + 3600,
        };
        let forged_payload =
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged_claims).expect("serialize"));
        let forged = format!("{forged_payload}.{signature}");

        assert_eq!(issuer.verify(&forged), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn test_tampered_signature() {
        let issuer = issuer();
        let issued = issuer.issue(UserId::new(1), &email()).expect("issue");
        let (payload, signature) = issued.token.split_once('.').expect("two segments");

        let replacement = if signature.starts_with('A') { "B" } else { "A" };
        let forged = format!("{payload}.{replacement}{}", &signature[1..]);

        assert_eq!(issuer.verify(&forged), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn test_other_secret_rejected() {
        let issued = issuer().issue(UserId::new(1), &email()).expect("issue");
        let other = TokenIssuer::new(
            SecretString::from("Zx8@wQ3!eR6#tY1$uI4%oP7^aS2&dF5*"),
            TimeDelta::hours(24),
        );

        assert_eq!(other.verify(&issued.token), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn test_malformed() {
        let issuer = issuer();
        for token in ["", "abc", ".", "a.b.c", "!!!.???", "eyJ.@@@"] {
            assert_eq!(
                issuer.verify(token),
                Err(TokenError::Malformed),
                "token {token:?}"
            );
        }
    }

    #[test]
    fn test_signed_garbage_claims_are_malformed() {
        let issuer = issuer();
        let payload = URL_SAFE_NO_PAD.encode(b"not json");
        let mut mac = issuer.mac().expect("mac");
        mac.update(payload.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        assert_eq!(
            issuer.verify(&format!("{payload}.{signature}")),
            Err(TokenError::Malformed)
        );
    }
}
