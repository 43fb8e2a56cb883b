//! Paged fetching of parcel locker records.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, REFERER, USER_AGENT};
use serde_json::Value;
use url::Url;

/// Page size requested from the points API.
pub const PER_PAGE: usize = 1000;

/// Most pages fetched from one base; page `MAX_PAGES + 1` is never requested.
pub const MAX_PAGES: u32 = 50;

/// Upstream response bodies are cut to this many characters in diagnostics.
const DIAGNOSTIC_BODY_CHARS: usize = 200;

const GEOWIDGET_REFERER: &str = "https://geowidget.easypack24.net";
const POINTS_USER_AGENT: &str = "Mozilla/5.0 (+InPost-Points-Fetch)";

/// Result of fetching one page.
#[derive(Debug, Clone, PartialEq)]
pub enum PageOutcome {
    /// Records on the page. Empty when the payload had no recognizable list.
    Items(Vec<Value>),
    /// The page could not be fetched or decoded.
    Failed(PageFailure),
}

/// Why a page failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFailure {
    /// HTTP status, absent for transport errors.
    pub status: Option<u16>,
    /// Start of the response body or the error text.
    pub body: String,
}

impl PageFailure {
    #[must_use]
    pub fn new(status: Option<u16>, body: &str) -> Self {
        Self {
            status,
            body: body.chars().take(DIAGNOSTIC_BODY_CHARS).collect(),
        }
    }
}

/// A failed page, recorded for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageDiagnostic {
    pub base: String,
    pub page: u32,
    pub failure: PageFailure,
}

/// Upstream locker API.
#[async_trait]
pub trait PointsSource: Send + Sync {
    /// Fetch page `page` (1-based) from `base`.
    async fn fetch_page(&self, base: &str, page: u32) -> PageOutcome;
}

/// Pull the record list out of a points payload.
///
/// API versions answer with a bare array or an object holding `items`,
/// `data` or `points`.
#[must_use]
pub fn extract_items(payload: Value) -> Vec<Value> {
    match payload {
        Value::Array(items) => items,
        Value::Object(mut map) => {
            let first = ["items", "data", "points"]
                .into_iter()
                .find_map(|key| map.remove(key).filter(is_present));
            match first {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            }
        }
        _ => Vec::new(),
    }
}

/// Whether a payload field counts as set: not null, false, zero or "".
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Records gathered from the first productive base.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub records: Vec<Value>,
    pub base: Option<String>,
    pub diagnostics: Vec<PageDiagnostic>,
}

/// Fetch every page from each base in turn until one yields records.
///
/// A base stops at a short page, an empty page, a failed page or after
/// [`MAX_PAGES`] full pages. Records gathered before a failure are kept.
/// Bases are never merged.
pub async fn fetch_all(source: &dyn PointsSource, bases: &[String]) -> FetchOutcome {
    let mut diagnostics = Vec::new();

    for base in bases {
        let mut collected = Vec::new();

        for page in 1..=MAX_PAGES {
            match source.fetch_page(base, page).await {
                PageOutcome::Failed(failure) => {
                    tracing::warn!(
                        base = %base,
                        page,
                        status = ?failure.status,
                        body = %failure.body,
                        "Locker page fetch failed"
                    );
                    diagnostics.push(PageDiagnostic {
                        base: base.clone(),
                        page,
                        failure,
                    });
                    break;
                }
                PageOutcome::Items(items) => {
                    if items.is_empty() {
                        break;
                    }
                    let last = items.len() < PER_PAGE;
                    collected.extend(items);
                    if last {
                        break;
                    }
                }
            }
        }

        if !collected.is_empty() {
            tracing::debug!(base = %base, records = collected.len(), "Locker records fetched");
            return FetchOutcome {
                records: collected,
                base: Some(base.clone()),
                diagnostics,
            };
        }
    }

    FetchOutcome {
        records: Vec::new(),
        base: None,
        diagnostics,
    }
}

/// [`PointsSource`] over HTTP.
#[derive(Clone)]
pub struct HttpPointsSource {
    client: reqwest::Client,
}

impl HttpPointsSource {
    /// Create a client with the headers the points API expects.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new() -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(REFERER, HeaderValue::from_static(GEOWIDGET_REFERER));
        headers.insert(USER_AGENT, HeaderValue::from_static(POINTS_USER_AGENT));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self { client })
    }
}

/// Page URL with the fixed locker filters.
///
/// # Errors
///
/// Returns error if `base` isn't a valid URL.
pub fn page_url(base: &str, page: u32) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(base)?;
    url.query_pairs_mut()
        .append_pair("type", "parcel_locker")
        .append_pair("status", "Operating")
        .append_pair("country", "PL")
        .append_pair("per_page", &PER_PAGE.to_string())
        .append_pair("page", &page.to_string());
    Ok(url)
}

#[async_trait]
impl PointsSource for HttpPointsSource {
    async fn fetch_page(&self, base: &str, page: u32) -> PageOutcome {
        let url = match page_url(base, page) {
            Ok(url) => url,
            Err(e) => return PageOutcome::Failed(PageFailure::new(None, &e.to_string())),
        };

        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => return PageOutcome::Failed(PageFailure::new(None, &e.to_string())),
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return PageOutcome::Failed(PageFailure::new(
                    Some(status.as_u16()),
                    &e.to_string(),
                ));
            }
        };

        if !status.is_success() {
            return PageOutcome::Failed(PageFailure::new(Some(status.as_u16()), &body));
        }

        match serde_json::from_str::<Value>(&body) {
            Ok(payload) => PageOutcome::Items(extract_items(payload)),
            Err(_) => PageOutcome::Failed(PageFailure::new(Some(status.as_u16()), &body)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_extract_items_shapes() {
        assert_eq!(extract_items(json!([{"name": "A"}])).len(), 1);
        assert_eq!(extract_items(json!({"items": [{"name": "A"}]})).len(), 1);
        assert_eq!(extract_items(json!({"data": [1, 2]})).len(), 2);
        assert_eq!(extract_items(json!({"points": [1, 2, 3]})).len(), 3);
        assert!(extract_items(json!({"count": 5})).is_empty());
        assert!(extract_items(json!("nope")).is_empty());
    }

    #[test]
    fn test_extract_items_first_set_alias_wins() {
        assert!(extract_items(json!({"items": [], "points": [1]})).is_empty());
        assert_eq!(extract_items(json!({"items": null, "points": [1]})).len(), 1);
        assert!(extract_items(json!({"items": "x", "points": [1]})).is_empty());
    }

    #[test]
    fn test_page_url_carries_filters() {
        let url = page_url("https://api-pl-points.easypack24.net/v1/points", 3).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api-pl-points.easypack24.net/v1/points?type=parcel_locker&status=Operating&country=PL&per_page=1000&page=3"
        );
    }

    /// Answers every page of every base with a full page.
    #[derive(Default)]
    struct EndlessSource {
        calls: std::sync::Mutex<Vec<(String, u32)>>,
    }

    #[async_trait]
    impl PointsSource for EndlessSource {
        async fn fetch_page(&self, base: &str, page: u32) -> PageOutcome {
            self.calls.lock().unwrap().push((base.to_owned(), page));
            PageOutcome::Items(vec![Value::Null; PER_PAGE])
        }
    }

    #[tokio::test]
    async fn test_fetch_all_stops_at_page_ceiling() {
        let source = EndlessSource::default();
        let bases = vec!["https://a.test".to_owned(), "https://b.test".to_owned()];

        let outcome = fetch_all(&source, &bases).await;

        let calls = source.calls.lock().unwrap().clone();
        assert_eq!(calls.len(), usize::try_from(MAX_PAGES).unwrap());
        assert!(calls.iter().all(|(base, _)| base == "https://a.test"));
        assert_eq!(calls.last().map(|(_, page)| *page), Some(MAX_PAGES));
        assert_eq!(outcome.records.len(), usize::try_from(MAX_PAGES).unwrap() * PER_PAGE);
        assert_eq!(outcome.base.as_deref(), Some("https://a.test"));
        assert!(outcome.diagnostics.is_empty());
    }

    #[test]
    fn test_failure_body_truncated() {
        let body = "ż".repeat(500);
        let failure = PageFailure::new(Some(500), &body);
        assert_eq!(failure.body.chars().count(), 200);
    }
}
