//! Parcel locker lookup.
//!
//! Fetches every operating locker from the points API, trying each
//! configured API version in order, and turns the records into a
//! [`LockerDirectory`]. Nothing is cached in process; responses carry
//! edge-cache headers instead.

pub mod collation;
pub mod directory;
pub mod source;

use thiserror::Error;

pub use directory::{LockerDirectory, LockerEntry};
pub use source::{
    FetchOutcome, HttpPointsSource, PageDiagnostic, PageFailure, PageOutcome, PointsSource,
    fetch_all,
};

/// Errors from building the locker directory.
#[derive(Debug, Error)]
pub enum LockerError {
    /// No base returned any record.
    #[error("no locker data from any points base ({} failed pages)", diagnostics.len())]
    Unavailable { diagnostics: Vec<PageDiagnostic> },
}

/// Fetch and build the directory.
///
/// # Errors
///
/// Returns `LockerError::Unavailable` if every base came back empty or failed.
pub async fn load_directory(
    source: &dyn PointsSource,
    bases: &[String],
) -> Result<LockerDirectory, LockerError> {
    let outcome = fetch_all(source, bases).await;

    if outcome.records.is_empty() {
        tracing::error!(
            diagnostics = ?outcome.diagnostics,
            "No locker data from any points base"
        );
        return Err(LockerError::Unavailable {
            diagnostics: outcome.diagnostics,
        });
    }

    let directory = LockerDirectory::build(&outcome.records);
    tracing::info!(
        base = outcome.base.as_deref().unwrap_or_default(),
        records = outcome.records.len(),
        cities = directory.cities.len(),
        lockers = directory.locker_count(),
        "Locker directory built"
    );
    Ok(directory)
}
