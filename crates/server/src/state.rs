//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::cache::{EphemeralCache, MokaCache};
use crate::config::ServerConfig;
use crate::db::{NoteStore, PgNoteRepository, PgUserRepository, UserStore};
use crate::services::auth::{AuthService, AuthSettings};
use crate::services::notifier::{LogNotifier, Notifier, NotifyError, SmtpNotifier};
use crate::services::token::TokenIssuer;

/// Error building application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("email transport: {0}")]
    Notifier(#[from] NotifyError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like the stores and the auth service.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    users: Arc<dyn UserStore>,
    notes: Arc<dyn NoteStore>,
    auth: AuthService,
}

impl AppState {
    /// Create the production state: Postgres repositories, a `moka` cache,
    /// and SMTP delivery when configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the SMTP transport cannot be configured.
    pub fn new(config: ServerConfig, pool: PgPool) -> Result<Self, StateError> {
        let notifier: Arc<dyn Notifier> = match &config.email {
            Some(email) => Arc::new(SmtpNotifier::new(email)?),
            None => {
                tracing::warn!("SMTP not configured - dev mode, verification codes will be logged");
                Arc::new(LogNotifier)
            }
        };
        let cache = Arc::new(MokaCache::new(config.cache.max_capacity));

        Ok(Self::from_parts(
            config,
            Arc::new(PgUserRepository::new(pool.clone())),
            Arc::new(PgNoteRepository::new(pool)),
            cache,
            notifier,
        ))
    }

    /// Assemble state from explicit collaborators.
    #[must_use]
    pub fn from_parts(
        config: ServerConfig,
        users: Arc<dyn UserStore>,
        notes: Arc<dyn NoteStore>,
        cache: Arc<dyn EphemeralCache>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let auth = AuthService::new(
            Arc::clone(&users),
            cache,
            notifier,
            TokenIssuer::from_config(&config.auth),
            AuthSettings::from_config(&config.auth),
        );

        Self {
            inner: Arc::new(AppStateInner {
                config,
                users,
                notes,
                auth,
            }),
        }
    }

    /// Get a reference to the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn users(&self) -> &dyn UserStore {
        self.inner.users.as_ref()
    }

    #[must_use]
    pub fn notes(&self) -> &dyn NoteStore {
        self.inner.notes.as_ref()
    }

    /// Registration, verification and login.
    #[must_use]
    pub fn auth(&self) -> &AuthService {
        &self.inner.auth
    }

    /// Session token issuer.
    #[must_use]
    pub fn tokens(&self) -> &TokenIssuer {
        self.inner.auth.tokens()
    }
}
