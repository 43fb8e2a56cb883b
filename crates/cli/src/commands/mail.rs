//! One partner mail run from the command line.
//!
//! # Usage
//!
//! ```bash
//! # Send whatever is due
//! gb-cli mail run
//!
//! # Send every active schedule now, next send in 2 minutes
//! gb-cli mail run --force --fast-minutes 2
//! ```
//!
//! Uses the full storefront environment (database, SMTP, chapters dir).

use chrono::Utc;

use guidebook_storefront::config::StorefrontConfig;
use guidebook_storefront::db;
use guidebook_storefront::models::Interval;
use guidebook_storefront::services::mailing::{DripScheduler, RunOptions, RunReport};
use guidebook_storefront::state::AppState;

use super::CliError;

/// Run one scheduler batch.
///
/// # Errors
///
/// Returns `CliError` if configuration, the database or the schedule read
/// fails. Individual delivery failures are only counted in the report.
pub async fn run(force: bool, fast_minutes: Option<u32>) -> Result<RunReport, CliError> {
    let config = StorefrontConfig::from_env()?;
    let pool = db::create_pool(&config.database_url).await?;
    let state = AppState::new(config, pool)?;

    let options = RunOptions {
        force,
        interval: fast_minutes.map_or(Interval::Cadence, |m| Interval::Minutes(m.max(1))),
    };

    let config = state.config();
    let report = DripScheduler::new(
        state.mailings(),
        state.mailer(),
        state.chapters(),
        &config.email.from_address,
        config.partner_mail.max_chapters,
    )
    .run(Utc::now(), options)
    .await?;

    tracing::info!(
        processed = report.processed,
        failed = report.failed,
        "Mail run finished"
    );
    Ok(report)
}
