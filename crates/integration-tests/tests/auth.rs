//! Login, logout, current user and chapter downloads.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use serde_json::json;

use guidebook_core::AccountStatus;
use guidebook_integration_tests::TestApp;

#[tokio::test]
async fn test_login_requires_both_fields() {
    let app = TestApp::new();

    for body in [
        "",
        "not json",
        r#"{"email":"reader@example.pl"}"#,
        r#"{"email":"  ","password":"x"}"#,
    ] {
        let response = app.post_raw("/api/login", None, body).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "body: {body}");
        assert_eq!(response.error(), "Brakuje email/hasła");
    }
}

#[tokio::test]
async fn test_login_rejects_bad_credentials() {
    let app = TestApp::new();
    app.users
        .add("reader@example.pl", "correct horse battery", AccountStatus::Paid);

    for (email, password) in [
        ("reader@example.pl", "wrong password"),
        ("nobody@example.pl", "correct horse battery"),
        ("not-an-email", "correct horse battery"),
    ] {
        let response = app
            .post_json(
                "/api/login",
                None,
                &json!({ "email": email, "password": password }),
            )
            .await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert_eq!(response.error(), "Nieprawidłowy email/hasło");
        assert!(response.session_cookie().is_none());
    }
}

#[tokio::test]
async fn test_login_then_me() {
    let app = TestApp::new();
    let cookie = app.signed_in("reader@example.pl", AccountStatus::Pending).await;

    let response = app.get("/api/me", Some(&cookie)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.json(),
        json!({ "email": "reader@example.pl", "paid": false })
    );
}

#[tokio::test]
async fn test_me_requires_session() {
    let app = TestApp::new();
    let response = app.get("/api/me", None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.error(), "Unauthorized");
}

#[tokio::test]
async fn test_logout_redirects_and_ends_session() {
    let app = TestApp::new();
    let cookie = app.signed_in("reader@example.pl", AccountStatus::Paid).await;

    let response = app.get("/api/logout", Some(&cookie)).await;
    assert!(response.status.is_redirection());
    assert_eq!(response.header("location"), Some("/"));

    let response = app.get("/api/me", Some(&cookie)).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Chapters
// =============================================================================

#[tokio::test]
async fn test_chapter_requires_login() {
    let app = TestApp::new();
    let response = app.get("/api/chapters/1", None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_chapter_requires_payment() {
    let app = TestApp::new();
    let cookie = app.signed_in("reader@example.pl", AccountStatus::Pending).await;

    let response = app.get("/api/chapters/1", Some(&cookie)).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.error(), "Brak dostępu");
}

#[tokio::test]
async fn test_chapter_out_of_range() {
    let app = TestApp::new();
    let cookie = app.signed_in("reader@example.pl", AccountStatus::Paid).await;

    for n in ["0", "4", "abc", "-1"] {
        let response = app.get(&format!("/api/chapters/{n}"), Some(&cookie)).await;
        assert_eq!(response.status, StatusCode::NOT_FOUND, "chapter {n}");
        assert_eq!(response.error(), "Nie ma takiego rozdziału");
    }
}

#[tokio::test]
async fn test_chapter_served_inline() {
    let app = TestApp::new();
    let cookie = app.signed_in("reader@example.pl", AccountStatus::Paid).await;

    let response = app.get("/api/chapters/2", Some(&cookie)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.header("content-type"), Some("application/pdf"));
    assert_eq!(response.header("cache-control"), Some("private, no-store"));
    assert_eq!(
        response.header("content-disposition"),
        Some("inline; filename=\"rozdzial-2.pdf\"")
    );
    assert_eq!(&response.body[..], b"%PDF-1.4 chapter 2");
}

// =============================================================================
// Health and response headers
// =============================================================================

#[tokio::test]
async fn test_health_endpoints() {
    let app = TestApp::new();

    let response = app.get("/health", None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(&response.body[..], b"ok");

    let response = app.get("/health/ready", None).await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_responses_carry_security_headers_and_request_id() {
    let app = TestApp::new();
    let response = app.get("/api/me", None).await;

    assert_eq!(response.header("x-frame-options"), Some("DENY"));
    assert_eq!(response.header("x-content-type-options"), Some("nosniff"));
    assert_eq!(response.header("cache-control"), Some("no-store, max-age=0"));
    assert!(
        response
            .header("x-request-id")
            .is_some_and(|id| !id.is_empty())
    );
}
