//! Payment provider integration.
//!
//! [`PaymentGateway`] is the seam to the payment provider; [`stripe`] holds
//! the production client and [`webhook`] the event verification. The
//! functions here turn validated orders into checkout sessions.

pub mod stripe;
pub mod webhook;

use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;

use guidebook_core::Email;

use crate::config::StripeConfig;
use crate::services::checkout::{
    BookOrder, COURIER_COUNTRIES, COURSE_NAME, COURSE_PRICE, CourierRate, Delivery,
    INPOST_COUNTRIES,
};

pub use self::stripe::StripeClient;

/// Errors from the payment provider.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The session came back without a redirect URL.
    #[error("checkout session has no url")]
    MissingUrl,
}

/// A customer record at the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Customer {
    pub id: String,
    pub name: Option<String>,
    pub phone: Option<String>,
}

/// Fields for a new customer.
#[derive(Debug, Clone, Default)]
pub struct NewCustomer {
    pub email: Option<Email>,
    pub name: Option<String>,
    pub phone: Option<String>,
}

/// Shipping details stored on a customer for prefill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerShipping {
    pub name: String,
    pub phone: String,
    pub line1: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

/// Partial customer update. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomerUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub shipping: Option<CustomerShipping>,
}

impl CustomerUpdate {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none() && self.phone.is_none() && self.shipping.is_none()
    }
}

/// Who pays for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payer {
    Customer(String),
    Email(Email),
    Anonymous,
}

/// What a line item charges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinePrice {
    /// A price configured at the provider.
    Catalog(String),
    /// An inline PLN amount in grosze.
    Inline { amount: i64, name: String },
}

/// The single line item of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineItem {
    pub price: LinePrice,
    pub quantity: u32,
}

/// A fixed shipping rate offered at checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShippingOffer {
    pub allowed_countries: Vec<&'static str>,
    pub display_name: String,
    pub amount: i64,
}

/// Parameters for a hosted checkout session (payment mode, PLN, Polish UI).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSessionRequest {
    pub payer: Payer,
    pub line_item: LineItem,
    pub success_url: String,
    pub cancel_url: String,
    pub shipping: Option<ShippingOffer>,
    /// Ask for phone and billing address, allow promotion codes and let the
    /// customer edit prefilled details.
    pub collect_details: bool,
    pub metadata: BTreeMap<String, String>,
}

/// A created checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

/// Payment provider operations used by checkout.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Find the first customer with this e-mail.
    async fn find_customer(&self, email: &Email) -> Result<Option<Customer>, PaymentError>;

    async fn create_customer(&self, customer: &NewCustomer) -> Result<Customer, PaymentError>;

    async fn update_customer(
        &self,
        customer_id: &str,
        update: &CustomerUpdate,
    ) -> Result<(), PaymentError>;

    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, PaymentError>;
}

/// A validated course purchase.
#[derive(Debug, Clone)]
pub struct CourseOrder {
    pub email: Option<Email>,
    pub qty: u32,
    /// Shipping choice recorded in metadata.
    pub shipping: String,
}

/// Start a checkout for the course.
///
/// Known e-mails are mapped to a provider customer (created on first use).
///
/// # Errors
///
/// Returns `PaymentError` if any provider call fails.
pub async fn start_course_checkout(
    gateway: &dyn PaymentGateway,
    base_url: &str,
    order: &CourseOrder,
) -> Result<CheckoutSession, PaymentError> {
    let payer = match &order.email {
        Some(email) => {
            let customer = match gateway.find_customer(email).await? {
                Some(customer) => customer,
                None => {
                    gateway
                        .create_customer(&NewCustomer {
                            email: Some(email.clone()),
                            ..NewCustomer::default()
                        })
                        .await?
                }
            };
            Payer::Customer(customer.id)
        }
        None => Payer::Anonymous,
    };

    let metadata = BTreeMap::from([
        (
            "user_email".to_owned(),
            order
                .email
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
        ),
        ("shipping".to_owned(), order.shipping.clone()),
    ]);

    let request = CheckoutSessionRequest {
        payer,
        line_item: LineItem {
            price: LinePrice::Inline {
                amount: COURSE_PRICE,
                name: COURSE_NAME.to_owned(),
            },
            quantity: order.qty,
        },
        success_url: format!("{base_url}/success"),
        cancel_url: format!("{base_url}/checkout?canceled=1"),
        shipping: None,
        collect_details: false,
        metadata,
    };

    gateway.create_checkout_session(&request).await
}

/// Line item for the printed book.
fn book_line_item(config: &StripeConfig) -> LineItem {
    let price = config.book_price_id.as_ref().map_or_else(
        || LinePrice::Inline {
            amount: config.book_amount,
            name: config.book_name.clone(),
        },
        |id| LinePrice::Catalog(id.clone()),
    );
    LineItem { price, quantity: 1 }
}

/// Shipping rate offered for a delivery choice.
#[must_use]
pub fn book_shipping_offer(config: &StripeConfig, delivery: &Delivery) -> ShippingOffer {
    match delivery {
        Delivery::Inpost { .. } => ShippingOffer {
            allowed_countries: INPOST_COUNTRIES.to_vec(),
            display_name: "Paczkomat InPost".to_owned(),
            amount: config.shipping.inpost,
        },
        Delivery::Courier { rate, .. } => {
            let (display_name, amount) = match rate {
                CourierRate::Express => (
                    "Kurier – ekspres (1–2 dni)",
                    config.shipping.courier_express,
                ),
                CourierRate::Standard => (
                    "Kurier – standard (3–5 dni)",
                    config.shipping.courier_standard,
                ),
            };
            ShippingOffer {
                allowed_countries: COURIER_COUNTRIES.to_vec(),
                display_name: display_name.to_owned(),
                amount,
            }
        }
    }
}

/// Metadata attached to a book session.
#[must_use]
pub fn book_metadata(order: &BookOrder) -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::from([
        ("kind".to_owned(), "physical_book".to_owned()),
        ("user_email".to_owned(), order.email.to_string()),
        (
            "shipping_method".to_owned(),
            order.delivery.method().to_owned(),
        ),
    ]);
    if let Delivery::Inpost {
        locker_id,
        locker_city,
    } = &order.delivery
    {
        metadata.insert("inpost_locker".to_owned(), locker_id.clone());
        if let Some(city) = locker_city {
            metadata.insert("inpost_city".to_owned(), city.clone());
        }
    }
    metadata
}

/// Start a checkout for the printed book.
///
/// The customer is found or created, their name and phone brought up to
/// date, and for courier orders the shipping address prefilled.
///
/// # Errors
///
/// Returns `PaymentError` if any provider call fails.
pub async fn start_book_checkout(
    gateway: &dyn PaymentGateway,
    config: &StripeConfig,
    base_url: &str,
    order: &BookOrder,
) -> Result<CheckoutSession, PaymentError> {
    let customer = match gateway.find_customer(&order.email).await? {
        Some(customer) => customer,
        None => {
            gateway
                .create_customer(&NewCustomer {
                    email: Some(order.email.clone()),
                    name: Some(order.name.clone()),
                    phone: Some(order.phone.clone()),
                })
                .await?
        }
    };

    let mut update = CustomerUpdate::default();
    if customer.name.as_deref() != Some(order.name.as_str()) {
        update.name = Some(order.name.clone());
    }
    if customer.phone.as_deref() != Some(order.phone.as_str()) {
        update.phone = Some(order.phone.clone());
    }
    if let Delivery::Courier { address, .. } = &order.delivery {
        update.shipping = Some(CustomerShipping {
            name: order.name.clone(),
            phone: order.phone.clone(),
            line1: address.line1.clone(),
            city: address.city.clone(),
            postal_code: address.postal_code.clone(),
            country: address.country.clone(),
        });
    }
    if !update.is_empty() {
        gateway.update_customer(&customer.id, &update).await?;
    }

    let request = CheckoutSessionRequest {
        payer: Payer::Customer(customer.id),
        line_item: book_line_item(config),
        success_url: format!("{base_url}/book/success"),
        cancel_url: format!("{base_url}/book/cancel"),
        shipping: Some(book_shipping_offer(config, &order.delivery)),
        collect_details: true,
        metadata: book_metadata(order),
    };

    gateway.create_checkout_session(&request).await
}
