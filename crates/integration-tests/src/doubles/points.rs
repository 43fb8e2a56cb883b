//! Scripted locker API.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::{Value, json};

use guidebook_storefront::services::lockers::{PageFailure, PageOutcome, PointsSource};

/// Answers with preset pages; anything not scripted is an empty page.
#[derive(Default)]
pub struct StaticPointsSource {
    pages: Mutex<HashMap<(String, u32), PageOutcome>>,
    calls: Mutex<Vec<(String, u32)>>,
}

impl StaticPointsSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Script page `page` of `base`.
    pub fn page(&self, base: &str, page: u32, outcome: PageOutcome) {
        self.pages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((base.to_owned(), page), outcome);
    }

    /// Script a page of records.
    pub fn items(&self, base: &str, page: u32, items: Vec<Value>) {
        self.page(base, page, PageOutcome::Items(items));
    }

    /// Script a failed page.
    pub fn fail(&self, base: &str, page: u32, status: u16) {
        self.page(
            base,
            page,
            PageOutcome::Failed(PageFailure::new(Some(status), "upstream error")),
        );
    }

    /// Requested `(base, page)` pairs in order.
    #[must_use]
    pub fn calls(&self) -> Vec<(String, u32)> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl PointsSource for StaticPointsSource {
    async fn fetch_page(&self, base: &str, page: u32) -> PageOutcome {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((base.to_owned(), page));
        self.pages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(base.to_owned(), page))
            .cloned()
            .unwrap_or_else(|| PageOutcome::Items(Vec::new()))
    }
}

/// A locker record in the upstream shape.
#[must_use]
pub fn locker(name: &str, city: &str, street: &str) -> Value {
    json!({
        "name": name,
        "address_details": { "city": city, "street": street, "building_number": "1" },
    })
}
