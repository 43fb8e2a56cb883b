//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! gb-cli migrate
//! ```
//!
//! Applies `crates/storefront/migrations/` and creates the session table
//! used by tower-sessions.

use tower_sessions_sqlx_store::PostgresStore;

use super::{CliError, connect};

/// Run storefront migrations and the session store migration.
///
/// # Errors
///
/// Returns `CliError` if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), CliError> {
    let pool = connect().await?;

    tracing::info!("Running storefront migrations...");
    sqlx::migrate!("../storefront/migrations").run(&pool).await?;

    tracing::info!("Creating session table...");
    PostgresStore::new(pool.clone())
        .migrate()
        .await
        .map_err(|e| CliError::SessionStore(e.to_string()))?;

    tracing::info!("Storefront migrations complete");
    Ok(())
}
