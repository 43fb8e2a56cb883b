//! Login, logout and current-user handlers.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{RequireAuth, clear_current_user, set_current_user};
use crate::models::CurrentUser;
use crate::routes::lenient_json;
use crate::services::auth::AuthService;
use crate::state::AppState;

/// Login request body.
#[derive(Debug, Default, Deserialize)]
pub struct LoginBody {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Response of `GET /api/me`.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub email: String,
    pub paid: bool,
}

/// Log in with e-mail and password.
///
/// Missing fields give 400, unknown accounts and wrong passwords 401.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    body: Bytes,
) -> Result<Response> {
    let body: LoginBody = lenient_json(&body);
    let (Some(email), Some(password)) = (
        body.email.filter(|e| !e.trim().is_empty()),
        body.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(AppError::BadRequest("Brakuje email/hasła".to_string()));
    };

    let user = AuthService::new(state.users())
        .login(&email, &password)
        .await
        .inspect_err(|e| tracing::warn!(error = %e, "Login failed"))?;

    let current = CurrentUser {
        id: user.id,
        email: user.email,
    };
    set_current_user(&session, &current)
        .await
        .map_err(|e| AppError::Internal(format!("session: {e}")))?;

    set_sentry_user(&current.id, Some(current.email.as_str()));
    tracing::info!(user_id = %current.id, "User logged in");

    Ok(Json(json!({ "ok": true })).into_response())
}

/// Drop the session and go back to the home page.
pub async fn logout(session: Session) -> Redirect {
    if let Err(e) = clear_current_user(&session).await {
        tracing::error!(error = %e, "Failed to clear session");
    }
    clear_sentry_user();
    Redirect::to("/")
}

/// The logged-in account and whether it has paid.
pub async fn me(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
) -> Result<Json<MeResponse>> {
    let user = state
        .users()
        .get_by_email(&current.email)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Unauthorized".to_string()))?;

    Ok(Json(MeResponse {
        paid: user.is_paid(),
        email: user.email.into_inner(),
    }))
}
