//! Authentication extractors.
//!
//! The logged-in user lives in the session under
//! [`session_keys::CURRENT_USER`]; these extractors read it back.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use crate::error::AppError;
use crate::models::{CurrentUser, session_keys};

/// Extractor that requires a logged-in user.
///
/// Rejects with `401 {"error": "Unauthorized"}` otherwise.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAuth(user): RequireAuth,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", user.email)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let OptionalAuth(user) = OptionalAuth::from_request_parts(parts, state)
            .await
            .unwrap_or(OptionalAuth(None));

        user.map(Self)
            .ok_or_else(|| AppError::Unauthorized("Unauthorized".to_string()))
    }
}

/// Extractor that optionally gets the current user.
///
/// Unlike `RequireAuth`, this does not reject the request if nobody is
/// logged in. A session that can't be read counts as anonymous.
pub struct OptionalAuth(pub Option<CurrentUser>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = match parts.extensions.get::<Session>() {
            Some(session) => session
                .get::<CurrentUser>(session_keys::CURRENT_USER)
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "Failed to read session");
                    None
                }),
            None => None,
        };

        Ok(Self(user))
    }
}

/// Store the logged-in user in the session.
///
/// The session id is cycled first so a pre-login id can't be reused.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_USER, user).await
}

/// Drop the whole session (logout).
///
/// # Errors
///
/// Returns an error if the session store can't delete it.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}
