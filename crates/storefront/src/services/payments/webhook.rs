//! Stripe webhook verification and event decoding.
//!
//! Implements Stripe's signature scheme: the `Stripe-Signature` header
//! carries `t=<unix time>` and one or more `v1=<hex hmac>` entries; the HMAC
//! is SHA-256 over `"{t}.{raw body}"` keyed with the endpoint secret.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use thiserror::Error;

use crate::services::constant_time_compare;

/// Maximum age of a signed payload in seconds.
pub const TOLERANCE_SECS: i64 = 300;

/// Event type that marks a purchase as paid.
pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

/// Webhook verification failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WebhookError {
    #[error("Missing signature")]
    MissingSignature,
    #[error("Webhook Error: malformed signature header")]
    MalformedHeader,
    #[error("Webhook Error: timestamp outside tolerance")]
    TimestampOutOfTolerance,
    #[error("Webhook Error: no signatures found matching the expected signature")]
    SignatureMismatch,
    #[error("Webhook Error: invalid payload: {0}")]
    InvalidPayload(String),
}

/// A decoded webhook event.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: Value,
}

impl WebhookEvent {
    /// E-mail of the buyer for a completed checkout.
    ///
    /// Prefers `metadata.user_email`, then `customer_details.email`.
    /// Returns `None` for other event types or when neither is set.
    #[must_use]
    pub fn paid_email(&self) -> Option<String> {
        if self.event_type != CHECKOUT_COMPLETED {
            return None;
        }
        let object = &self.data.object;
        ["/metadata/user_email", "/customer_details/email"]
            .iter()
            .filter_map(|p| object.pointer(p).and_then(Value::as_str))
            .map(str::trim)
            .find(|s| !s.is_empty())
            .map(str::to_owned)
    }
}

fn sign(secret: &str, timestamp: &str, payload: &[u8]) -> Result<String, WebhookError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|_| WebhookError::MalformedHeader)?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Build a header value for `payload` signed at `timestamp`.
///
/// Used for tests and local tooling.
///
/// # Errors
///
/// Returns error if the secret can't key an HMAC.
pub fn signature_header(secret: &str, timestamp: i64, payload: &[u8]) -> Result<String, WebhookError> {
    let t = timestamp.to_string();
    Ok(format!("t={t},v1={}", sign(secret, &t, payload)?))
}

/// Verify a signed payload and decode the event.
///
/// # Errors
///
/// Returns `WebhookError` if the header is malformed, stale or doesn't match.
pub fn verify_and_parse(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: i64,
) -> Result<WebhookEvent, WebhookError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(WebhookError::MalformedHeader)?;
    if signatures.is_empty() {
        return Err(WebhookError::MalformedHeader);
    }
    let ts: i64 = timestamp
        .parse()
        .map_err(|_| WebhookError::MalformedHeader)?;
    if (now - ts).abs() > TOLERANCE_SECS {
        return Err(WebhookError::TimestampOutOfTolerance);
    }

    let expected = sign(secret, timestamp, payload)?;
    if !signatures
        .iter()
        .any(|sig| constant_time_compare(&expected, sig))
    {
        return Err(WebhookError::SignatureMismatch);
    }

    serde_json::from_slice(payload).map_err(|e| WebhookError::InvalidPayload(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";
    const NOW: i64 = 1_760_000_000;

    fn completed(metadata_email: &str) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "type": "checkout.session.completed",
            "data": {"object": {
                "metadata": {"user_email": metadata_email},
                "customer_details": {"email": "details@example.pl"}
            }}
        }))
        .unwrap()
    }

    #[test]
    fn test_valid_signature_accepted() {
        let body = completed("buyer@example.pl");
        let header = signature_header(SECRET, NOW, &body).unwrap();
        let event = verify_and_parse(&body, &header, SECRET, NOW + 10).unwrap();
        assert_eq!(event.paid_email().as_deref(), Some("buyer@example.pl"));
    }

    #[test]
    fn test_any_v1_may_match() {
        let body = completed("buyer@example.pl");
        let good = signature_header(SECRET, NOW, &body).unwrap();
        let v1 = good.split_once(",v1=").unwrap().1;
        let header = format!("t={NOW},v1=deadbeef,v1={v1}");
        assert!(verify_and_parse(&body, &header, SECRET, NOW).is_ok());
    }

    #[test]
    fn test_tampered_body_rejected() {
        let body = completed("buyer@example.pl");
        let header = signature_header(SECRET, NOW, &body).unwrap();
        let tampered = completed("attacker@example.pl");
        assert_eq!(
            verify_and_parse(&tampered, &header, SECRET, NOW).unwrap_err(),
            WebhookError::SignatureMismatch
        );
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let body = completed("buyer@example.pl");
        let header = signature_header(SECRET, NOW, &body).unwrap();
        assert_eq!(
            verify_and_parse(&body, &header, SECRET, NOW + TOLERANCE_SECS + 1).unwrap_err(),
            WebhookError::TimestampOutOfTolerance
        );
    }

    #[test]
    fn test_malformed_header_rejected() {
        let body = completed("buyer@example.pl");
        assert_eq!(
            verify_and_parse(&body, "garbage", SECRET, NOW).unwrap_err(),
            WebhookError::MalformedHeader
        );
    }

    #[test]
    fn test_email_falls_back_to_customer_details() {
        let body = completed("");
        let header = signature_header(SECRET, NOW, &body).unwrap();
        let event = verify_and_parse(&body, &header, SECRET, NOW).unwrap();
        assert_eq!(event.paid_email().as_deref(), Some("details@example.pl"));
    }

    #[test]
    fn test_other_events_have_no_paid_email() {
        let event: WebhookEvent = serde_json::from_value(serde_json::json!({
            "type": "payment_intent.created",
            "data": {"object": {"metadata": {"user_email": "x@example.pl"}}}
        }))
        .unwrap();
        assert_eq!(event.paid_email(), None);
    }
}
