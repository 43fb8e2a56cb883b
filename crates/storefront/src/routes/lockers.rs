//! Parcel locker directory endpoint.

use axum::{
    Json,
    extract::State,
    http::header::CACHE_CONTROL,
    response::{IntoResponse, Response},
};

use crate::error::Result;
use crate::services::lockers::load_directory;
use crate::state::AppState;

/// Edge caching for the directory; it changes at most daily.
pub const DIRECTORY_CACHE_CONTROL: &str = "public, s-maxage=86400, stale-while-revalidate=86400";

/// All operating lockers grouped by city.
///
/// Fetched from the points API on every call; caching is left to the CDN.
pub async fn directory(State(state): State<AppState>) -> Result<Response> {
    let directory = load_directory(state.points(), &state.config().lockers.bases).await?;
    Ok(([(CACHE_CONTROL, DIRECTORY_CACHE_CONTROL)], Json(directory)).into_response())
}
