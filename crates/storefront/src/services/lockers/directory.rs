//! City-grouped locker directory built from raw point records.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;
use serde_json::Value;

use super::collation;

/// One locker as shown to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockerEntry {
    pub id: String,
    pub address: String,
}

/// Lockers grouped by city.
///
/// `cities` lists every key of `data` in Polish alphabetical order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LockerDirectory {
    pub cities: Vec<String>,
    pub data: BTreeMap<String, Vec<LockerEntry>>,
}

/// Scalar field as text: non-empty strings and non-zero numbers.
fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64().is_some_and(|f| f != 0.0) => Some(n.to_string()),
        _ => None,
    }
}

fn first_text(record: &Value, pointers: &[&str]) -> Option<String> {
    pointers.iter().find_map(|p| text(record.pointer(p)))
}

/// Identifier of a record: the first set of `name`, `id`, `code`.
#[must_use]
pub fn record_key(record: &Value) -> Option<String> {
    first_text(record, &["/name", "/id", "/code"])
}

/// City of a record, trimmed.
///
/// The first non-empty alias wins; if it is only whitespace the record has
/// no city.
#[must_use]
pub fn record_city(record: &Value) -> Option<String> {
    let city = first_text(
        record,
        &[
            "/address_details/city",
            "/address/city",
            "/address/city_name",
            "/city",
        ],
    )?;
    let city = city.trim();
    (!city.is_empty()).then(|| city.to_owned())
}

/// Street and building number joined by a space.
#[must_use]
pub fn record_address(record: &Value) -> String {
    let street = first_text(record, &["/address_details/street", "/address/street"]);
    let building = first_text(
        record,
        &[
            "/address_details/building_number",
            "/address/building_number",
        ],
    );

    [street, building]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_owned()
}

impl LockerDirectory {
    /// Deduplicate, group and sort raw records.
    ///
    /// Records without an identifier or city are dropped. Cities are grouped
    /// case-insensitively and keep the spelling of their first record.
    #[must_use]
    pub fn build(records: &[Value]) -> Self {
        let mut seen = HashSet::new();
        let mut groups: Vec<(String, Vec<LockerEntry>)> = Vec::new();
        let mut by_key: HashMap<String, usize> = HashMap::new();

        for record in records {
            let Some(id) = record_key(record) else {
                continue;
            };
            if !seen.insert(id.clone()) {
                continue;
            }
            let Some(city) = record_city(record) else {
                continue;
            };

            let entry = LockerEntry {
                id,
                address: record_address(record),
            };
            let idx = *by_key.entry(city.to_uppercase()).or_insert_with(|| {
                groups.push((city, Vec::new()));
                groups.len() - 1
            });
            if let Some((_, lockers)) = groups.get_mut(idx) {
                lockers.push(entry);
            }
        }

        groups.sort_by(|(a, _), (b, _)| collation::compare(a, b));

        let mut directory = Self::default();
        for (city, mut lockers) in groups {
            lockers.sort_by(|a, b| collation::compare(&a.id, &b.id));
            directory.cities.push(city.clone());
            directory.data.insert(city, lockers);
        }
        directory
    }

    /// Number of lockers across all cities.
    #[must_use]
    pub fn locker_count(&self) -> usize {
        self.data.values().map(Vec::len).sum()
    }
}
