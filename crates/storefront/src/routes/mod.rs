//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! # Auth
//! POST     /api/login                 - Password login (rate limited)
//! GET|POST /api/logout                - Drop the session, redirect to /
//! GET      /api/me                    - Current account (requires auth)
//!
//! # Checkout
//! POST /api/pay/quote                 - Course price breakdown
//! POST /api/pay                       - Course checkout session
//! POST /api/book/checkout             - Printed book checkout session
//! POST /api/stripe/webhook            - Signed payment events
//!
//! # Lockers
//! GET  /api/inpost/data               - Lockers grouped by city
//!
//! # Partner mailing
//! GET  /api/partner-mail/cron         - Run one scheduler batch (shared key)
//! POST /api/partner-mail/schedule     - Sign a partner up (requires auth)
//!
//! # Chapters
//! GET  /api/chapters/{n}              - Chapter PDF (requires paid account)
//! ```

pub mod auth;
pub mod chapters;
pub mod checkout;
pub mod lockers;
pub mod partner_mail;
pub mod webhook;

use axum::{
    Router,
    routing::{get, post},
};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::middleware::login_rate_limiter;
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(auth::login).layer(login_rate_limiter()))
        .route("/logout", get(auth::logout).post(auth::logout))
        .route("/me", get(auth::me))
}

/// Create the checkout and payment routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/pay", post(checkout::pay))
        .route("/pay/quote", post(checkout::quote))
        .route("/book/checkout", post(checkout::book_checkout))
        .route("/stripe/webhook", post(webhook::stripe_webhook))
}

/// Create the partner mailing routes router.
pub fn partner_mail_routes() -> Router<AppState> {
    Router::new()
        .route("/cron", get(partner_mail::cron))
        .route("/schedule", post(partner_mail::schedule))
}

/// Create all API routes for the storefront.
pub fn routes() -> Router<AppState> {
    let api = Router::new()
        .merge(auth_routes())
        .merge(checkout_routes())
        .nest("/partner-mail", partner_mail_routes())
        .route("/inpost/data", get(lockers::directory))
        .route("/chapters/{n}", get(chapters::chapter));

    Router::new().nest("/api", api)
}

/// Parse a JSON body, treating an empty or malformed body as the default.
pub(crate) fn lenient_json<T: DeserializeOwned + Default>(body: &[u8]) -> T {
    if body.is_empty() {
        return T::default();
    }
    serde_json::from_slice(body).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "Unreadable JSON body, using defaults");
        T::default()
    })
}

/// A field as text: strings are kept, numbers and booleans stringified.
pub(crate) fn text_field(body: &Value, key: &str) -> Option<String> {
    match body.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// A field as an integer: numbers (truncated) or numeric strings.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn int_field(body: &Value, key: &str) -> Option<i64> {
    match body.get(key)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct Body {
        name: Option<String>,
    }

    #[test]
    fn test_lenient_json_defaults() {
        assert_eq!(lenient_json::<Body>(b""), Body::default());
        assert_eq!(lenient_json::<Body>(b"{not json"), Body::default());
        assert_eq!(
            lenient_json::<Body>(br#"{"name":"Ala"}"#).name.as_deref(),
            Some("Ala")
        );
    }

    #[test]
    fn test_text_field_stringifies_scalars() {
        let body = json!({"phone": 600_100_200, "lockerId": "KRA01M", "x": null});
        assert_eq!(text_field(&body, "phone").as_deref(), Some("600100200"));
        assert_eq!(text_field(&body, "lockerId").as_deref(), Some("KRA01M"));
        assert_eq!(text_field(&body, "x"), None);
        assert_eq!(text_field(&body, "missing"), None);
    }

    #[test]
    fn test_int_field_accepts_numeric_strings() {
        let body = json!({"a": 3, "b": "7", "c": "seven", "d": 2.9});
        assert_eq!(int_field(&body, "a"), Some(3));
        assert_eq!(int_field(&body, "b"), Some(7));
        assert_eq!(int_field(&body, "c"), None);
        assert_eq!(int_field(&body, "d"), Some(2));
    }
}
