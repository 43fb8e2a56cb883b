//! Partner chapter mailing: trigger and sign-up.

use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
};
use chrono::Utc;
use secrecy::ExposeSecret;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::instrument;

use guidebook_core::{CadenceDays, Email};

use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::{Interval, NewMailing};
use crate::routes::{int_field, lenient_json, text_field};
use crate::services::constant_time_compare;
use crate::services::mailing::{DripScheduler, RunOptions};
use crate::state::AppState;

/// Query string of the scheduler trigger.
#[derive(Debug, Default)]
pub struct CronQuery {
    pub key: Option<String>,
    pub fast: Option<String>,
    pub minutes: Option<String>,
    pub force: Option<String>,
}

impl CronQuery {
    /// Read the known parameters from raw pairs.
    ///
    /// A repeated name keeps its first value; unknown names are ignored.
    #[must_use]
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut query = Self::default();
        for (name, value) in pairs {
            let slot = match name.as_str() {
                "key" => &mut query.key,
                "fast" => &mut query.fast,
                "minutes" => &mut query.minutes,
                "force" => &mut query.force,
                _ => continue,
            };
            slot.get_or_insert(value);
        }
        query
    }

    /// Run options implied by the flags.
    ///
    /// `fast=1` spaces sends by `minutes` (default and floor 1) instead of
    /// the schedule cadence; `force=1` ignores send times. Only whole
    /// minutes are understood, anything else counts as 1.
    #[must_use]
    pub fn run_options(&self) -> RunOptions {
        let interval = if flag(self.fast.as_deref()) {
            let minutes = self
                .minutes
                .as_deref()
                .and_then(|m| m.trim().parse::<u32>().ok())
                .unwrap_or(1);
            Interval::Minutes(minutes.max(1))
        } else {
            Interval::Cadence
        };

        RunOptions {
            force: flag(self.force.as_deref()),
            interval,
        }
    }
}

fn flag(value: Option<&str>) -> bool {
    value == Some("1")
}

/// Response of the scheduler trigger.
#[derive(Debug, Serialize)]
pub struct CronResponse {
    pub processed: usize,
}

/// Run one scheduler batch.
///
/// The key is checked before anything else is touched.
#[instrument(skip_all)]
pub async fn cron(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<CronResponse>> {
    let query = CronQuery::from_pairs(pairs);
    let config = state.config();
    let authorized = query.key.as_deref().is_some_and(|key| {
        constant_time_compare(key, config.partner_mail.cron_secret.expose_secret())
    });
    if !authorized {
        tracing::warn!("Partner mail trigger with bad key");
        return Err(AppError::Forbidden("Forbidden".to_string()));
    }

    let scheduler = DripScheduler::new(
        state.mailings(),
        state.mailer(),
        state.chapters(),
        &config.email.from_address,
        config.partner_mail.max_chapters,
    );
    let report = scheduler.run(Utc::now(), query.run_options()).await?;

    Ok(Json(CronResponse {
        processed: report.processed,
    }))
}

/// Sign a partner up for chapter mails.
///
/// Body `{partnerEmail, cadenceDays?}`; the first chapter goes out on the
/// next scheduler run.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn schedule(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    body: Bytes,
) -> Result<Json<Value>> {
    let body: Value = lenient_json(&body);

    let recipient = text_field(&body, "partnerEmail")
        .and_then(|e| Email::parse(e.trim()).ok())
        .ok_or_else(|| AppError::BadRequest("Podaj poprawny e-mail partnera.".to_string()))?;
    let cadence = CadenceDays::from_request(int_field(&body, "cadenceDays"));

    let mailing = NewMailing {
        user_email: user.email,
        recipient,
        cadence,
        first_send_at: Utc::now(),
    };

    let created = state.mailings().insert(mailing).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to store partner mailing");
        AppError::Storage("Błąd zapisu do bazy.".to_string())
    })?;

    tracing::info!(mailing_id = %created.id, cadence = %cadence, "Partner mailing scheduled");
    Ok(Json(json!({ "ok": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(fast: Option<&str>, minutes: Option<&str>, force: Option<&str>) -> CronQuery {
        CronQuery {
            key: None,
            fast: fast.map(str::to_owned),
            minutes: minutes.map(str::to_owned),
            force: force.map(str::to_owned),
        }
    }

    #[test]
    fn test_default_options_use_cadence() {
        let options = query(None, Some("5"), None).run_options();
        assert!(!options.force);
        assert_eq!(options.interval, Interval::Cadence);
    }

    #[test]
    fn test_fast_minutes() {
        assert_eq!(
            query(Some("1"), Some("5"), None).run_options().interval,
            Interval::Minutes(5)
        );
        assert_eq!(
            query(Some("1"), None, None).run_options().interval,
            Interval::Minutes(1)
        );
        assert_eq!(
            query(Some("1"), Some("abc"), None).run_options().interval,
            Interval::Minutes(1)
        );
        assert_eq!(
            query(Some("1"), Some("0"), None).run_options().interval,
            Interval::Minutes(1)
        );
        assert_eq!(
            query(Some("1"), Some("2.5"), None).run_options().interval,
            Interval::Minutes(1)
        );
    }

    #[test]
    fn test_from_pairs_keeps_first_value() {
        let pairs = [
            ("key", "a"),
            ("fast", "1"),
            ("key", "b"),
            ("fast", "0"),
            ("utm_source", "cron"),
        ]
        .into_iter()
        .map(|(n, v)| (n.to_owned(), v.to_owned()))
        .collect();

        let query = CronQuery::from_pairs(pairs);
        assert_eq!(query.key.as_deref(), Some("a"));
        assert_eq!(query.fast.as_deref(), Some("1"));
        assert_eq!(query.minutes, None);
        assert_eq!(query.force, None);
    }

    #[test]
    fn test_force_flag() {
        assert!(query(None, None, Some("1")).run_options().force);
        assert!(!query(None, None, Some("true")).run_options().force);
    }
}
