//! Database operations for storefront `PostgreSQL`.
//!
//! # Tables
//!
//! - `storefront.user` - Site accounts with argon2 password hashes and payment status
//! - `storefront.partner_mailing` - Partner chapter drip schedules
//! - `tower_sessions.session` - Tower-sessions storage (created by the store's migration)
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p guidebook-cli -- migrate
//! ```
//!
//! Handlers and services talk to the stores through the [`UserStore`] and
//! [`MailingStore`] traits so tests can swap in in-memory implementations.

pub mod mailings;
pub mod users;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use guidebook_core::{AccountStatus, Chapter, Email, MailingId};

use crate::models::{Advance, MailingSchedule, NewMailing, User};

pub use mailings::MailingRepository;
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Account persistence.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Look up a user by e-mail.
    async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError>;

    /// Look up a user together with their stored password hash.
    async fn get_with_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError>;

    /// Create an account.
    ///
    /// Returns `RepositoryError::Conflict` if the e-mail is taken.
    async fn create(
        &self,
        email: &Email,
        password_hash: &str,
        status: AccountStatus,
    ) -> Result<User, RepositoryError>;

    /// Mark the account with this e-mail as paid.
    ///
    /// Returns `false` when no account matched.
    async fn mark_paid(&self, email: &Email) -> Result<bool, RepositoryError>;
}

/// Partner mailing schedule persistence.
#[async_trait]
pub trait MailingStore: Send + Sync {
    /// Insert a new active schedule starting at chapter 1.
    async fn insert(&self, mailing: NewMailing) -> Result<MailingSchedule, RepositoryError>;

    /// Read up to `limit` active schedules.
    ///
    /// With `due_before` set, only schedules whose send time is at or before
    /// it are returned. Ordered by send time.
    async fn select_active(
        &self,
        due_before: Option<DateTime<Utc>>,
        limit: u32,
    ) -> Result<Vec<MailingSchedule>, RepositoryError>;

    /// Apply a post-delivery transition.
    ///
    /// Only takes effect while the schedule is still active at
    /// `expected_chapter`; returns whether a row changed.
    async fn apply(
        &self,
        id: MailingId,
        expected_chapter: Chapter,
        advance: Advance,
    ) -> Result<bool, RepositoryError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Parse an e-mail column, reporting bad values as corruption.
pub(crate) fn parse_stored_email(value: &str) -> Result<Email, RepositoryError> {
    Email::parse(value)
        .map_err(|e| RepositoryError::DataCorruption(format!("invalid email in database: {e}")))
}
