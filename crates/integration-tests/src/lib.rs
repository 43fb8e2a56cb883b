//! Integration tests for the guidebook storefront.
//!
//! The storefront router is driven in-process with `tower::ServiceExt::oneshot`.
//! Every external collaborator (database stores, SMTP, chapter files, the
//! locker API and the payment provider) is replaced with an in-memory double
//! from [`doubles`], so the suite needs no running services.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p guidebook-integration-tests
//! ```

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::missing_panics_doc)]

pub mod doubles;

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use secrecy::SecretString;
use serde_json::Value;
use tower::ServiceExt;
use tower_sessions::MemoryStore;

use guidebook_core::{AccountStatus, Chapter};
use guidebook_storefront::app;
use guidebook_storefront::config::{
    EmailConfig, LockerConfig, PartnerMailConfig, ShippingRates, StorefrontConfig, StripeConfig,
};
use guidebook_storefront::state::{AppState, Services};

use doubles::{
    FakePaymentGateway, InMemoryChapterLibrary, InMemoryMailingStore, InMemoryUserStore,
    RecordingMailer, StaticPointsSource,
};

pub const BASE_URL: &str = "https://guidebook.test";
pub const CRON_KEY: &str = "cron-key-for-tests";
pub const WEBHOOK_SECRET: &str = "whsec_test_secret";
pub const FROM_ADDRESS: &str = "Przewodnik <noreply@guidebook.test>";
pub const PRIMARY_BASE: &str = "https://points.test/v1";
pub const FALLBACK_BASE: &str = "https://points.test/v0";
pub const MAX_CHAPTERS: u32 = 3;
pub const BOOK_AMOUNT: i64 = 8_900;

/// Configuration with test secrets and no SMTP relay.
#[must_use]
pub fn test_config() -> StorefrontConfig {
    StorefrontConfig {
        database_url: SecretString::from("postgres://unused".to_owned()),
        host: IpAddr::from([127, 0, 0, 1]),
        port: 0,
        base_url: BASE_URL.to_owned(),
        session_secret: SecretString::from("session-secret-for-tests".to_owned()),
        stripe: StripeConfig {
            secret_key: SecretString::from("sk_test_unused".to_owned()),
            webhook_secret: SecretString::from(WEBHOOK_SECRET.to_owned()),
            book_price_id: None,
            book_amount: BOOK_AMOUNT,
            book_name: "Przewodnik (wydanie drukowane)".to_owned(),
            shipping: ShippingRates::default(),
        },
        email: EmailConfig {
            from_address: FROM_ADDRESS.to_owned(),
            smtp: None,
        },
        partner_mail: PartnerMailConfig {
            cron_secret: SecretString::from(CRON_KEY.to_owned()),
            chapters_dir: PathBuf::from("/nonexistent"),
            max_chapters: Chapter::new(MAX_CHAPTERS),
        },
        lockers: LockerConfig {
            bases: vec![PRIMARY_BASE.to_owned(), FALLBACK_BASE.to_owned()],
        },
        sentry_dsn: None,
        sentry_environment: None,
    }
}

/// A response with its body collected.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    /// Body parsed as JSON.
    #[must_use]
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("response body should be JSON")
    }

    /// `error` field of a JSON error body.
    #[must_use]
    pub fn error(&self) -> String {
        self.json()["error"]
            .as_str()
            .expect("error body should carry a message")
            .to_owned()
    }

    /// Header value as text.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// `name=value` of the session cookie, if one was set.
    #[must_use]
    pub fn session_cookie(&self) -> Option<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|c| c.starts_with("gb_session="))
            .and_then(|c| c.split(';').next())
            .map(str::to_owned)
    }
}

/// The storefront router wired to in-memory doubles.
pub struct TestApp {
    pub users: Arc<InMemoryUserStore>,
    pub mailings: Arc<InMemoryMailingStore>,
    pub mailer: Arc<RecordingMailer>,
    pub points: Arc<StaticPointsSource>,
    pub payments: Arc<FakePaymentGateway>,
    router: Router,
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

impl TestApp {
    #[must_use]
    pub fn new() -> Self {
        Self::with_chapter_files(MAX_CHAPTERS)
    }

    /// App whose chapter library only holds files for chapters `1..=count`.
    #[must_use]
    pub fn with_chapter_files(count: u32) -> Self {
        let users = Arc::new(InMemoryUserStore::new());
        let mailings = Arc::new(InMemoryMailingStore::new());
        let mailer = Arc::new(RecordingMailer::new());
        let points = Arc::new(StaticPointsSource::new());
        let payments = Arc::new(FakePaymentGateway::new());

        let services = Services {
            users: users.clone(),
            mailings: mailings.clone(),
            mailer: mailer.clone(),
            chapters: Arc::new(InMemoryChapterLibrary::with_chapters(count)),
            points: points.clone(),
            payments: payments.clone(),
        };
        let state = AppState::from_parts(test_config(), None, services);
        let router = app(state, MemoryStore::default());

        Self {
            users,
            mailings,
            mailer,
            points,
            payments,
            router,
        }
    }

    /// Send a request through the router.
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable");
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> TestResponse {
        self.send(request(Method::GET, uri, cookie, Body::empty()))
            .await
    }

    /// POST a raw body with a JSON content type.
    pub async fn post_raw(&self, uri: &str, cookie: Option<&str>, body: &str) -> TestResponse {
        let mut req = request(Method::POST, uri, cookie, Body::from(body.to_owned()));
        req.headers_mut().insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        self.send(req).await
    }

    pub async fn post_json(&self, uri: &str, cookie: Option<&str>, body: &Value) -> TestResponse {
        self.post_raw(uri, cookie, &body.to_string()).await
    }

    /// Create an account and log it in, returning the session cookie.
    pub async fn signed_in(&self, email: &str, status: AccountStatus) -> String {
        let password = "correct horse battery";
        self.users.add(email, password, status);
        let response = self
            .post_json(
                "/api/login",
                None,
                &serde_json::json!({ "email": email, "password": password }),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "login should succeed");
        response
            .session_cookie()
            .expect("login should set a session cookie")
    }
}

/// Build a request from a client address, optionally with a cookie.
#[must_use]
pub fn request(method: Method, uri: &str, cookie: Option<&str>, body: Body) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-forwarded-for", "203.0.113.7");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(body).expect("request should build")
}
