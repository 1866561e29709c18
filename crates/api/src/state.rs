//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::services::checkout::CheckoutService;
use crate::services::email::EmailService;
use crate::services::media::MediaService;
use crate::services::auth::TokenService;

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`; hands out the connection pool, the token
/// service, and the external-service clients.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    pool: PgPool,
    tokens: TokenService,
    checkout: CheckoutService,
    email: Option<EmailService>,
    media: Option<MediaService>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the SMTP relay cannot be set up.
    pub fn new(config: Config, pool: PgPool) -> Result<Self, crate::services::email::EmailError> {
        let tokens = TokenService::new(&config.jwt);
        let checkout = CheckoutService::new(&config.checkout);
        let email = config
            .email
            .as_ref()
            .map(EmailService::new)
            .transpose()?;
        let media = config.media.as_ref().map(MediaService::new);

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                tokens,
                checkout,
                email,
                media,
            }),
        })
    }

    /// Get a reference to the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the token service.
    #[must_use]
    pub fn tokens(&self) -> &TokenService {
        &self.inner.tokens
    }

    /// Get a reference to the payment gateway client.
    #[must_use]
    pub fn checkout(&self) -> &CheckoutService {
        &self.inner.checkout
    }

    /// Get the email service, if SMTP is configured.
    #[must_use]
    pub fn email(&self) -> Option<&EmailService> {
        self.inner.email.as_ref()
    }

    /// Get the image host client, if configured.
    #[must_use]
    pub fn media(&self) -> Option<&MediaService> {
        self.inner.media.as_ref()
    }
}
