//! Paid chapter downloads.

use axum::{
    extract::{Path, State},
    http::header::{CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_TYPE},
    response::{IntoResponse, Response},
};

use guidebook_core::Chapter;

use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::state::AppState;

/// Serve chapter `n` as a PDF to a paying user.
pub async fn chapter(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Path(n): Path<String>,
) -> Result<Response> {
    let user = state
        .users()
        .get_by_email(&current.email)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Unauthorized".to_string()))?;
    if !user.is_paid() {
        return Err(AppError::Forbidden("Brak dostępu".to_string()));
    }

    let max = state.config().partner_mail.max_chapters;
    let chapter = n
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|n| (1..=max.get()).contains(n))
        .map(Chapter::new)
        .ok_or_else(|| AppError::NotFound("Nie ma takiego rozdziału".to_string()))?;

    let file = state
        .chapters()
        .attachment(chapter)
        .await
        .ok_or_else(|| AppError::NotFound("Nie ma takiego rozdziału".to_string()))?;

    let disposition = format!("inline; filename=\"{}\"", file.filename);
    Ok((
        [
            (CONTENT_TYPE, file.content_type),
            (CACHE_CONTROL, "private, no-store".to_owned()),
            (CONTENT_DISPOSITION, disposition),
        ],
        file.bytes,
    )
        .into_response())
}
