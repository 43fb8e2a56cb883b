//! Course and book checkout handlers.

use axum::{Json, body::Bytes, extract::State};
use serde::Serialize;
use serde_json::Value;
use tracing::instrument;

use guidebook_core::{CurrencyCode, Email, Price};

use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::OptionalAuth;
use crate::routes::{int_field, lenient_json, text_field};
use crate::services::checkout::{
    BookOrderForm, COURSE_PRICE, CourseQuote, CourseShipping, clamp_qty, quote_course,
};
use crate::services::payments::{CourseOrder, start_book_checkout, start_course_checkout};
use crate::state::AppState;

/// Redirect target of a created checkout session.
#[derive(Debug, Serialize)]
pub struct CheckoutRedirect {
    pub url: String,
}

/// Price a course order (`{qty, coupon, shipping}`).
pub async fn quote(body: Bytes) -> Json<CourseQuote> {
    let body: Value = lenient_json(&body);
    let qty = clamp_qty(int_field(&body, "qty"));
    let coupon = text_field(&body, "coupon").unwrap_or_default();
    let shipping = CourseShipping::parse(text_field(&body, "shipping").as_deref());

    Json(quote_course(qty, &coupon, shipping))
}

/// Start a course checkout session.
///
/// The session e-mail wins over one in the body. An e-mail in the body that
/// doesn't parse is rejected; no e-mail at all gives an anonymous session.
#[instrument(skip_all)]
pub async fn pay(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    body: Bytes,
) -> Result<Json<CheckoutRedirect>> {
    let body: Value = lenient_json(&body);

    let email = match user {
        Some(user) => Some(user.email),
        None => text_field(&body, "email")
            .map(|e| e.trim().to_owned())
            .filter(|e| !e.is_empty())
            .map(|e| Email::parse(&e))
            .transpose()
            .map_err(|_| AppError::BadRequest("Podaj poprawny adres e-mail.".to_string()))?,
    };

    let order = CourseOrder {
        email,
        qty: clamp_qty(int_field(&body, "qty")),
        shipping: text_field(&body, "shipping").unwrap_or_else(|| "standard".to_owned()),
    };

    let session =
        start_course_checkout(state.payments(), &state.config().base_url, &order).await?;

    let amount =
        Price::from_minor_units(COURSE_PRICE * i64::from(order.qty), CurrencyCode::PLN).display();
    add_breadcrumb(
        "checkout",
        "Course checkout session created",
        Some(&[("amount", amount.as_str())]),
    );
    Ok(Json(CheckoutRedirect { url: session.url }))
}

/// Start a printed book checkout session.
#[instrument(skip_all)]
pub async fn book_checkout(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    body: Bytes,
) -> Result<Json<CheckoutRedirect>> {
    let body: Value = lenient_json(&body);
    let form = BookOrderForm {
        email: text_field(&body, "email"),
        name: text_field(&body, "name"),
        phone: text_field(&body, "phone"),
        shipping: text_field(&body, "shipping"),
        courier_rate: text_field(&body, "courierRate"),
        address_line1: text_field(&body, "addressLine1"),
        postal_code: text_field(&body, "postalCode"),
        city: text_field(&body, "city"),
        country: text_field(&body, "country"),
        locker_id: text_field(&body, "lockerId"),
        locker_city: text_field(&body, "lockerCity"),
    };

    let order = form.validate(user.as_ref().map(|u| &u.email))?;
    let config = state.config();
    let session =
        start_book_checkout(state.payments(), &config.stripe, &config.base_url, &order).await?;

    add_breadcrumb(
        "checkout",
        "Book checkout session created",
        Some(&[("shipping_method", order.delivery.method())]),
    );
    Ok(Json(CheckoutRedirect { url: session.url }))
}
