//! Partner mailing: sign-up and the scheduler trigger.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use serde_json::json;

use guidebook_core::{AccountStatus, CadenceDays, Chapter, Email, MailingId};
use guidebook_integration_tests::{CRON_KEY, FROM_ADDRESS, MAX_CHAPTERS, TestApp};
use guidebook_storefront::models::{MailingSchedule, ScheduleState};

fn email(s: &str) -> Email {
    Email::parse(s).unwrap()
}

fn schedule(id: i64, recipient: &str, chapter: u32, due_in: Duration) -> MailingSchedule {
    MailingSchedule {
        id: MailingId::new(id),
        user_email: email("owner@example.pl"),
        recipient: email(recipient),
        cadence: CadenceDays::DEFAULT,
        state: ScheduleState::Active {
            chapter: Chapter::new(chapter),
            next_send_at: Utc::now() + due_in,
        },
    }
}

fn cron_uri(extra: &str) -> String {
    format!("/api/partner-mail/cron?key={CRON_KEY}{extra}")
}

// =============================================================================
// Sign-up
// =============================================================================

#[tokio::test]
async fn test_schedule_requires_login() {
    let app = TestApp::new();
    let response = app
        .post_json(
            "/api/partner-mail/schedule",
            None,
            &json!({ "partnerEmail": "partner@example.pl" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert!(app.mailings.all().is_empty());
}

#[tokio::test]
async fn test_schedule_rejects_bad_partner_email() {
    let app = TestApp::new();
    let cookie = app.signed_in("owner@example.pl", AccountStatus::Paid).await;

    let response = app
        .post_json(
            "/api/partner-mail/schedule",
            Some(&cookie),
            &json!({ "partnerEmail": "not an address" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.error(), "Podaj poprawny e-mail partnera.");
}

#[tokio::test]
async fn test_schedule_creates_active_schedule() {
    let app = TestApp::new();
    let cookie = app.signed_in("owner@example.pl", AccountStatus::Paid).await;
    let before = Utc::now();

    let response = app
        .post_json(
            "/api/partner-mail/schedule",
            Some(&cookie),
            &json!({ "partnerEmail": " partner@example.pl ", "cadenceDays": "7" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json(), json!({ "ok": true }));

    let all = app.mailings.all();
    assert_eq!(all.len(), 1);
    let created = &all[0];
    assert_eq!(created.user_email, email("owner@example.pl"));
    assert_eq!(created.recipient, email("partner@example.pl"));
    assert_eq!(created.cadence.get(), 7);
    match created.state {
        ScheduleState::Active {
            chapter,
            next_send_at,
        } => {
            assert_eq!(chapter, Chapter::FIRST);
            assert!(next_send_at >= before && next_send_at <= Utc::now());
        }
        ScheduleState::Finished { .. } => panic!("new schedule must be active"),
    }
}

#[tokio::test]
async fn test_schedule_clamps_cadence() {
    let app = TestApp::new();
    let cookie = app.signed_in("owner@example.pl", AccountStatus::Pending).await;

    let response = app
        .post_json(
            "/api/partner-mail/schedule",
            Some(&cookie),
            &json!({ "partnerEmail": "partner@example.pl", "cadenceDays": 90 }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(app.mailings.all()[0].cadence.get(), CadenceDays::MAX);
}

#[tokio::test]
async fn test_schedule_store_failure() {
    let app = TestApp::new();
    let cookie = app.signed_in("owner@example.pl", AccountStatus::Paid).await;
    app.mailings.fail_writes();

    let response = app
        .post_json(
            "/api/partner-mail/schedule",
            Some(&cookie),
            &json!({ "partnerEmail": "partner@example.pl" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.error(), "Błąd zapisu do bazy.");
}

// =============================================================================
// Scheduler trigger
// =============================================================================

#[tokio::test]
async fn test_cron_bad_key_touches_nothing() {
    let app = TestApp::new();
    app.mailings
        .seed(schedule(1, "partner@example.pl", 1, Duration::minutes(-5)));

    for uri in [
        "/api/partner-mail/cron",
        "/api/partner-mail/cron?key=wrong",
        "/api/partner-mail/cron?key=wrong&key=wrong2",
        "/api/partner-mail/cron?key=&force=1&force=1",
    ] {
        let response = app.get(uri, None).await;
        assert_eq!(response.status, StatusCode::FORBIDDEN);
        assert_eq!(response.error(), "Forbidden");
    }
    assert_eq!(app.mailings.reads(), 0);
    assert!(app.mailer.sent().is_empty());
}

#[tokio::test]
async fn test_cron_repeated_params_use_first_value() {
    let app = TestApp::new();
    app.mailings
        .seed(schedule(1, "partner@example.pl", 1, Duration::minutes(-1)));

    let uri = format!(
        "/api/partner-mail/cron?key={CRON_KEY}&key=wrong&fast=1&fast=0&minutes=5&minutes=60"
    );
    let started = Utc::now();
    let response = app.get(&uri, None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json(), json!({ "processed": 1 }));

    match app.mailings.get(MailingId::new(1)).unwrap().state {
        ScheduleState::Active { next_send_at, .. } => {
            assert!(next_send_at >= started + Duration::minutes(5));
            assert!(next_send_at <= Utc::now() + Duration::minutes(5));
        }
        ScheduleState::Finished { .. } => panic!("schedule should continue"),
    }
}

#[tokio::test]
async fn test_cron_sends_due_chapter_and_advances() {
    let app = TestApp::new();
    app.mailings
        .seed(schedule(1, "due@example.pl", 1, Duration::minutes(-5)));
    let later = schedule(2, "later@example.pl", 1, Duration::days(1));
    app.mailings.seed(later.clone());

    let started = Utc::now();
    let response = app.get(&cron_uri(""), None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json(), json!({ "processed": 1 }));

    let sent = app.mailer.sent();
    assert_eq!(sent.len(), 1);
    let mail = &sent[0];
    assert_eq!(mail.to, email("due@example.pl"));
    assert_eq!(mail.from, FROM_ADDRESS);
    assert_eq!(mail.subject, "Rozdział 1 — Wasz plan krok po kroku");
    assert!(mail.text.contains("co 3 dni"));
    assert_eq!(mail.attachments.len(), 1);
    assert_eq!(mail.attachments[0].filename, "rozdzial-1.pdf");
    assert_eq!(mail.attachments[0].content_type, "application/pdf");

    match app.mailings.get(MailingId::new(1)).unwrap().state {
        ScheduleState::Active {
            chapter,
            next_send_at,
        } => {
            assert_eq!(chapter, Chapter::new(2));
            assert!(next_send_at >= started + Duration::days(3));
            assert!(next_send_at <= Utc::now() + Duration::days(3));
        }
        ScheduleState::Finished { .. } => panic!("schedule should continue"),
    }
    assert_eq!(app.mailings.get(MailingId::new(2)).unwrap(), later);
}

#[tokio::test]
async fn test_cron_finishes_after_last_chapter() {
    let app = TestApp::new();
    app.mailings.seed(schedule(
        1,
        "partner@example.pl",
        MAX_CHAPTERS,
        Duration::minutes(-1),
    ));

    let response = app.get(&cron_uri(""), None).await;
    assert_eq!(response.json(), json!({ "processed": 1 }));
    assert_eq!(
        app.mailings.get(MailingId::new(1)).unwrap().state,
        ScheduleState::Finished {
            last_chapter: Chapter::new(MAX_CHAPTERS)
        }
    );

    // A finished schedule is never picked up again.
    let response = app.get(&cron_uri("&force=1"), None).await;
    assert_eq!(response.json(), json!({ "processed": 0 }));
    assert_eq!(app.mailer.sent().len(), 1);
}

#[tokio::test]
async fn test_cron_failed_delivery_leaves_schedule() {
    let app = TestApp::new();
    let original = schedule(1, "bounce@example.pl", 2, Duration::minutes(-1));
    app.mailings.seed(original.clone());
    app.mailings
        .seed(schedule(2, "ok@example.pl", 1, Duration::minutes(-1)));
    app.mailer.fail_for("bounce@example.pl");

    let response = app.get(&cron_uri(""), None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json(), json!({ "processed": 1 }));
    assert_eq!(app.mailings.get(MailingId::new(1)).unwrap(), original);
}

#[tokio::test]
async fn test_cron_force_sends_future_schedules() {
    let app = TestApp::new();
    app.mailings
        .seed(schedule(1, "partner@example.pl", 1, Duration::days(2)));

    let response = app.get(&cron_uri(""), None).await;
    assert_eq!(response.json(), json!({ "processed": 0 }));

    let response = app.get(&cron_uri("&force=1"), None).await;
    assert_eq!(response.json(), json!({ "processed": 1 }));
}

#[tokio::test]
async fn test_cron_fast_mode_uses_minutes() {
    let app = TestApp::new();
    app.mailings
        .seed(schedule(1, "partner@example.pl", 1, Duration::minutes(-1)));

    let started = Utc::now();
    let response = app.get(&cron_uri("&fast=1&minutes=5"), None).await;
    assert_eq!(response.json(), json!({ "processed": 1 }));

    match app.mailings.get(MailingId::new(1)).unwrap().state {
        ScheduleState::Active { next_send_at, .. } => {
            assert!(next_send_at >= started + Duration::minutes(5));
            assert!(next_send_at <= Utc::now() + Duration::minutes(5));
        }
        ScheduleState::Finished { .. } => panic!("schedule should continue"),
    }
}

#[tokio::test]
async fn test_cron_sends_chapter_without_file() {
    let app = TestApp::with_chapter_files(1);
    app.mailings
        .seed(schedule(1, "partner@example.pl", 2, Duration::minutes(-1)));

    let response = app.get(&cron_uri(""), None).await;
    assert_eq!(response.json(), json!({ "processed": 1 }));

    let sent = app.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "Rozdział 2 — Wasz plan krok po kroku");
    assert!(sent[0].attachments.is_empty());
    assert!(matches!(
        app.mailings.get(MailingId::new(1)).unwrap().state,
        ScheduleState::Active { chapter, .. } if chapter == Chapter::new(3)
    ));
}

#[tokio::test]
async fn test_cron_batch_is_capped() {
    let app = TestApp::new();
    for id in 1..=55 {
        app.mailings.seed(schedule(
            id,
            &format!("partner{id}@example.pl"),
            1,
            Duration::minutes(-120 + id),
        ));
    }

    let response = app.get(&cron_uri(""), None).await;
    assert_eq!(response.json(), json!({ "processed": 50 }));
    assert_eq!(app.mailer.sent().len(), 50);

    // The oldest due schedules go first; the newest five wait.
    let waiting: Vec<i64> = app
        .mailings
        .all()
        .into_iter()
        .filter(|s| {
            matches!(s.state, ScheduleState::Active { chapter, .. } if chapter == Chapter::FIRST)
        })
        .map(|s| s.id.get())
        .collect();
    assert_eq!(waiting, vec![51, 52, 53, 54, 55]);

    let response = app.get(&cron_uri(""), None).await;
    assert_eq!(response.json(), json!({ "processed": 5 }));
}

#[tokio::test]
async fn test_cron_store_failure() {
    let app = TestApp::new();
    app.mailings.fail_reads();

    let response = app.get(&cron_uri(""), None).await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.error(), "db error");
}
