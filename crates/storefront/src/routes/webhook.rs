//! Stripe webhook endpoint.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
};
use chrono::Utc;
use secrecy::ExposeSecret;
use serde_json::{Value, json};
use tracing::instrument;

use guidebook_core::Email;

use crate::error::{Result, add_breadcrumb};
use crate::services::payments::webhook::{WebhookError, verify_and_parse};
use crate::state::AppState;

/// Signature header sent by Stripe.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Receive a signed Stripe event.
///
/// A completed checkout marks the buyer's account as paid. Failing to
/// update the account is logged and the event is still acknowledged, so
/// Stripe doesn't retry it.
#[instrument(skip_all)]
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(WebhookError::MissingSignature)?;

    let event = verify_and_parse(
        &body,
        signature,
        state.config().stripe.webhook_secret.expose_secret(),
        Utc::now().timestamp(),
    )
    .inspect_err(|e| tracing::warn!(error = %e, "Rejected webhook"))?;

    add_breadcrumb(
        "webhook",
        "Stripe event received",
        Some(&[("type", event.event_type.as_str())]),
    );

    if let Some(raw) = event.paid_email() {
        mark_paid(&state, &raw).await;
    } else {
        tracing::debug!(event_type = %event.event_type, "Webhook event ignored");
    }

    Ok(Json(json!({ "received": true })))
}

async fn mark_paid(state: &AppState, raw: &str) {
    let Ok(email) = Email::parse(raw) else {
        tracing::warn!(email = %raw, "Paid checkout carries an unusable e-mail");
        return;
    };

    match state.users().mark_paid(&email).await {
        Ok(true) => tracing::info!(email = %email, "Account marked as paid"),
        Ok(false) => tracing::warn!(email = %email, "Paid checkout for unknown account"),
        Err(e) => tracing::error!(email = %email, error = %e, "Failed to mark account as paid"),
    }
}
