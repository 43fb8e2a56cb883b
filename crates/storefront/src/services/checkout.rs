//! Course pricing and order validation.
//!
//! Everything here is pure: amounts are in grosze (1/100 PLN) and requests
//! are turned into validated orders before any payment call is made.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;

use guidebook_core::Email;

/// Catalogue price of the course per unit.
pub const COURSE_LIST_PRICE: i64 = 20_000;
/// Sale price of the course per unit.
pub const COURSE_PRICE: i64 = 14_900;
/// Product name shown at checkout for the course.
pub const COURSE_NAME: &str = "Pełen Dostęp do Przewodnika";
/// Coupon granting [`COUPON_PERCENT`] off the subtotal.
pub const COUPON_CODE: &str = "KODRABATOWY";
pub const COUPON_PERCENT: i64 = 10;
/// Largest quantity accepted for one course checkout.
pub const MAX_QTY: u32 = 10;

/// Countries a courier parcel can be sent to.
pub const COURIER_COUNTRIES: [&str; 14] = [
    "PL", "DE", "CZ", "SK", "AT", "NL", "BE", "GB", "FR", "IE", "DK", "SE", "NO", "US",
];
/// Countries with InPost lockers.
pub const INPOST_COUNTRIES: [&str; 1] = ["PL"];

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?\d{9,15}$").expect("Invalid regex"));

/// Validation failures. Messages are shown to the customer as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckoutError {
    #[error("Podaj poprawny adres e-mail.")]
    InvalidEmail,
    #[error("Imię i nazwisko są wymagane.")]
    MissingName,
    #[error("Telefon jest wymagany.")]
    InvalidPhone,
    #[error("Uzupełnij adres dla kuriera.")]
    IncompleteAddress,
    #[error("Brak wybranego paczkomatu.")]
    MissingLocker,
    #[error("Nieprawidłowy typ dostawy.")]
    InvalidShipping,
}

/// Delivery option for the course bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CourseShipping {
    #[default]
    Standard,
    Express,
}

impl CourseShipping {
    /// Parse the client value; anything but `express` is standard.
    #[must_use]
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("express") => Self::Express,
            _ => Self::Standard,
        }
    }

    #[must_use]
    pub const fn cost(self) -> i64 {
        match self {
            Self::Standard => 0,
            Self::Express => 1900,
        }
    }
}

/// Clamp a requested quantity into `1..=MAX_QTY`, defaulting to 1.
#[must_use]
pub fn clamp_qty(qty: Option<i64>) -> u32 {
    let clamped = qty.unwrap_or(1).clamp(1, i64::from(MAX_QTY));
    u32::try_from(clamped).unwrap_or(1)
}

/// Price breakdown for a course order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseQuote {
    pub qty: u32,
    pub catalog_subtotal: i64,
    pub subtotal: i64,
    pub base_discount_per_item: i64,
    pub base_discount_total: i64,
    /// Sale discount off the list price as a percentage with one decimal.
    pub base_discount_pct: String,
    pub coupon_applied: bool,
    pub discount: i64,
    pub shipping: i64,
    pub total: i64,
}

/// Round `value * percent / 100` to the nearest unit, halves away from zero.
fn percent_of(value: i64, percent: i64) -> i64 {
    let scaled = value * percent;
    if scaled >= 0 {
        (scaled + 50) / 100
    } else {
        (scaled - 50) / 100
    }
}

/// `part / whole` as a percentage rounded to one decimal.
fn percent_one_decimal(part: i64, whole: i64) -> String {
    if whole == 0 {
        return "0.0".to_owned();
    }
    let tenths = (part * 1000 * 2 + whole) / (whole * 2);
    format!("{}.{}", tenths / 10, tenths % 10)
}

/// Whether `code` is the discount coupon (case and surrounding space ignored).
#[must_use]
pub fn coupon_matches(code: &str) -> bool {
    code.trim().eq_ignore_ascii_case(COUPON_CODE)
}

/// Price a course order.
#[must_use]
pub fn quote_course(qty: u32, coupon: &str, shipping: CourseShipping) -> CourseQuote {
    let units = i64::from(qty);
    let subtotal = COURSE_PRICE * units;
    let base_discount_per_item = COURSE_LIST_PRICE - COURSE_PRICE;
    let coupon_applied = coupon_matches(coupon);
    let discount = if coupon_applied {
        percent_of(subtotal, COUPON_PERCENT)
    } else {
        0
    };

    CourseQuote {
        qty,
        catalog_subtotal: COURSE_LIST_PRICE * units,
        subtotal,
        base_discount_per_item,
        base_discount_total: base_discount_per_item * units,
        base_discount_pct: percent_one_decimal(base_discount_per_item, COURSE_LIST_PRICE),
        coupon_applied,
        discount,
        shipping: shipping.cost(),
        total: (subtotal - discount).max(0) + shipping.cost(),
    }
}

/// Courier delivery speed for the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CourierRate {
    Standard,
    Express,
}

/// Courier delivery address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShippingAddress {
    pub line1: String,
    pub postal_code: String,
    pub city: String,
    /// ISO country code, upper case.
    pub country: String,
}

/// How the book reaches the customer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Courier {
        address: ShippingAddress,
        rate: CourierRate,
    },
    Inpost {
        locker_id: String,
        locker_city: Option<String>,
    },
}

impl Delivery {
    /// Metadata value naming the method.
    #[must_use]
    pub const fn method(&self) -> &'static str {
        match self {
            Self::Courier { .. } => "courier",
            Self::Inpost { .. } => "inpost",
        }
    }
}

/// Unvalidated book order fields as posted by the client.
#[derive(Debug, Clone, Default)]
pub struct BookOrderForm {
    pub email: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub shipping: Option<String>,
    pub courier_rate: Option<String>,
    pub address_line1: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub locker_id: Option<String>,
    pub locker_city: Option<String>,
}

/// A validated physical book order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookOrder {
    pub email: Email,
    pub name: String,
    pub phone: String,
    pub delivery: Delivery,
}

fn filled(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

impl BookOrderForm {
    /// Validate the form. `session_email` is used when the form has none.
    ///
    /// # Errors
    ///
    /// Returns the first failing field, checked in the order e-mail, name,
    /// phone, shipping.
    pub fn validate(self, session_email: Option<&Email>) -> Result<BookOrder, CheckoutError> {
        let email = match filled(self.email) {
            Some(raw) => Email::parse(&raw).map_err(|_| CheckoutError::InvalidEmail)?,
            None => session_email.cloned().ok_or(CheckoutError::InvalidEmail)?,
        };

        let name = filled(self.name).ok_or(CheckoutError::MissingName)?;

        let phone = filled(self.phone)
            .filter(|p| PHONE_RE.is_match(p))
            .ok_or(CheckoutError::InvalidPhone)?;

        let delivery = match self.shipping.as_deref().map(str::trim) {
            Some("courier") => {
                let (Some(line1), Some(postal_code), Some(city)) = (
                    filled(self.address_line1),
                    filled(self.postal_code),
                    filled(self.city),
                ) else {
                    return Err(CheckoutError::IncompleteAddress);
                };
                let country = filled(self.country)
                    .map_or_else(|| "PL".to_owned(), |c| c.to_ascii_uppercase());
                let rate = match self.courier_rate.as_deref() {
                    Some("express") => CourierRate::Express,
                    _ => CourierRate::Standard,
                };
                Delivery::Courier {
                    address: ShippingAddress {
                        line1,
                        postal_code,
                        city,
                        country,
                    },
                    rate,
                }
            }
            Some("inpost") => Delivery::Inpost {
                locker_id: filled(self.locker_id).ok_or(CheckoutError::MissingLocker)?,
                locker_city: filled(self.locker_city),
            },
            _ => return Err(CheckoutError::InvalidShipping),
        };

        Ok(BookOrder {
            email,
            name,
            phone,
            delivery,
        })
    }
}
