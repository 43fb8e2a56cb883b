//! CLI command implementations.

pub mod mail;
pub mod migrate;
pub mod user;

use secrecy::SecretString;
use sqlx::PgPool;
use thiserror::Error;

use guidebook_storefront::db;

/// Errors from any command.
#[derive(Debug, Error)]
pub enum CliError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Session store error: {0}")]
    SessionStore(String),

    #[error(transparent)]
    Auth(#[from] guidebook_storefront::services::auth::AuthError),

    #[error(transparent)]
    Config(#[from] guidebook_storefront::config::ConfigError),

    #[error(transparent)]
    State(#[from] guidebook_storefront::state::StateError),

    #[error(transparent)]
    Scheduler(#[from] guidebook_storefront::services::mailing::SchedulerError),
}

/// Connect using `STOREFRONT_DATABASE_URL`, falling back to `DATABASE_URL`.
///
/// Only the database URL is needed, so commands that don't touch Stripe or
/// mail work without the rest of the storefront environment.
async fn connect() -> Result<PgPool, CliError> {
    dotenvy::dotenv().ok();

    let url = std::env::var("STOREFRONT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map_err(|_| CliError::MissingEnvVar("STOREFRONT_DATABASE_URL"))?;

    tracing::info!("Connecting to storefront database...");
    Ok(db::create_pool(&SecretString::from(url)).await?)
}
