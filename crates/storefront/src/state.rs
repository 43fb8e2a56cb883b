//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;
use thiserror::Error;

use crate::config::StorefrontConfig;
use crate::db::{MailingRepository, MailingStore, UserRepository, UserStore};
use crate::services::chapters::{ChapterLibrary, FsChapterLibrary};
use crate::services::email::{Mailer, PreviewMailer, SmtpMailer};
use crate::services::lockers::{HttpPointsSource, PointsSource};
use crate::services::payments::{PaymentError, PaymentGateway, StripeClient};

/// Error building the production collaborators.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("smtp transport: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("points client: {0}")]
    Http(#[from] reqwest::Error),
    #[error("payment client: {0}")]
    Payment(#[from] PaymentError),
}

/// External collaborators used by the handlers.
///
/// Production wiring lives in [`AppState::new`]; tests hand in doubles via
/// [`AppState::from_parts`].
#[derive(Clone)]
pub struct Services {
    pub users: Arc<dyn UserStore>,
    pub mailings: Arc<dyn MailingStore>,
    pub mailer: Arc<dyn Mailer>,
    pub chapters: Arc<dyn ChapterLibrary>,
    pub points: Arc<dyn PointsSource>,
    pub payments: Arc<dyn PaymentGateway>,
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like the database pool, configuration and the
/// collaborator services.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: Option<PgPool>,
    services: Services,
}

impl AppState {
    /// Create the production application state.
    ///
    /// Mail goes through SMTP when a relay is configured and is logged
    /// otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client or the SMTP transport can't be built.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, StateError> {
        let mailer: Arc<dyn Mailer> = match &config.email.smtp {
            Some(smtp) => Arc::new(SmtpMailer::new(smtp)?),
            None => {
                tracing::warn!("SMTP_HOST not set, outgoing mail will only be logged");
                Arc::new(PreviewMailer)
            }
        };

        let services = Services {
            users: Arc::new(UserRepository::new(pool.clone())),
            mailings: Arc::new(MailingRepository::new(pool.clone())),
            mailer,
            chapters: Arc::new(FsChapterLibrary::new(
                config.partner_mail.chapters_dir.clone(),
            )),
            points: Arc::new(HttpPointsSource::new()?),
            payments: Arc::new(StripeClient::new(&config.stripe.secret_key)?),
        };

        Ok(Self::from_parts(config, Some(pool), services))
    }

    /// Assemble state from explicit parts.
    #[must_use]
    pub fn from_parts(config: StorefrontConfig, pool: Option<PgPool>, services: Services) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                services,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get the database pool, if the state is backed by one.
    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.inner.pool.as_ref()
    }

    #[must_use]
    pub fn users(&self) -> &dyn UserStore {
        self.inner.services.users.as_ref()
    }

    #[must_use]
    pub fn mailings(&self) -> &dyn MailingStore {
        self.inner.services.mailings.as_ref()
    }

    #[must_use]
    pub fn mailer(&self) -> &dyn Mailer {
        self.inner.services.mailer.as_ref()
    }

    #[must_use]
    pub fn chapters(&self) -> &dyn ChapterLibrary {
        self.inner.services.chapters.as_ref()
    }

    /// Upstream parcel locker points API.
    #[must_use]
    pub fn points(&self) -> &dyn PointsSource {
        self.inner.services.points.as_ref()
    }

    /// Payment provider client.
    #[must_use]
    pub fn payments(&self) -> &dyn PaymentGateway {
        self.inner.services.payments.as_ref()
    }
}
