//! Stripe REST client.
//!
//! Stripe takes `application/x-www-form-urlencoded` bodies with bracketed
//! keys for nested fields (`line_items[0][quantity]`). Requests are built as
//! flat key/value lists so they can be checked without a network.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use url::Url;

use guidebook_core::{CurrencyCode, Email};

use super::{
    CheckoutSession, CheckoutSessionRequest, Customer, CustomerUpdate, LinePrice, NewCustomer,
    Payer, PaymentError, PaymentGateway,
};

/// Stripe API base URL.
const BASE_URL: &str = "https://api.stripe.com/v1";

/// Currency for every charge.
const CURRENCY: &str = CurrencyCode::PLN.api_code();

type Form = Vec<(String, String)>;

/// Stripe API client.
#[derive(Clone)]
pub struct StripeClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct CustomerObject {
    id: String,
    name: Option<String>,
    phone: Option<String>,
}

impl From<CustomerObject> for Customer {
    fn from(c: CustomerObject) -> Self {
        Self {
            id: c.id,
            name: c.name,
            phone: c.phone,
        }
    }
}

#[derive(Deserialize)]
struct CustomerList {
    data: Vec<CustomerObject>,
}

#[derive(Deserialize)]
struct SessionObject {
    id: String,
    url: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl StripeClient {
    /// Create a new Stripe client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(secret_key: &SecretString) -> Result<Self, PaymentError> {
        Self::with_base_url(secret_key, BASE_URL)
    }

    /// Create a client against another API root (e.g. a local mock).
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn with_base_url(secret_key: &SecretString, base_url: &str) -> Result<Self, PaymentError> {
        let mut headers = HeaderMap::new();
        let auth_value = format!("Bearer {}", secret_key.expose_secret());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth_value)
                .map_err(|e| PaymentError::Parse(format!("Invalid API key format: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    async fn read<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
    ) -> Result<T, PaymentError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .ok()
                .and_then(|e| e.error.message)
                .unwrap_or(body);
            return Err(PaymentError::Api {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|e| PaymentError::Parse(e.to_string()))
    }

    async fn post_form<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        form: &Form,
    ) -> Result<T, PaymentError> {
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .form(form)
            .send()
            .await?;
        Self::read(response).await
    }
}

fn push(form: &mut Form, key: impl Into<String>, value: impl Into<String>) {
    form.push((key.into(), value.into()));
}

/// Form fields for creating a customer.
#[must_use]
pub fn customer_form(customer: &NewCustomer) -> Form {
    let mut form = Form::new();
    if let Some(email) = &customer.email {
        push(&mut form, "email", email.as_str());
    }
    if let Some(name) = &customer.name {
        push(&mut form, "name", name.as_str());
    }
    if let Some(phone) = &customer.phone {
        push(&mut form, "phone", phone.as_str());
    }
    form
}

/// Form fields for a customer update.
#[must_use]
pub fn customer_update_form(update: &CustomerUpdate) -> Form {
    let mut form = Form::new();
    if let Some(name) = &update.name {
        push(&mut form, "name", name.as_str());
    }
    if let Some(phone) = &update.phone {
        push(&mut form, "phone", phone.as_str());
    }
    if let Some(shipping) = &update.shipping {
        push(&mut form, "shipping[name]", shipping.name.as_str());
        push(&mut form, "shipping[phone]", shipping.phone.as_str());
        push(&mut form, "shipping[address][line1]", shipping.line1.as_str());
        push(&mut form, "shipping[address][city]", shipping.city.as_str());
        push(
            &mut form,
            "shipping[address][postal_code]",
            shipping.postal_code.as_str(),
        );
        push(
            &mut form,
            "shipping[address][country]",
            shipping.country.as_str(),
        );
    }
    form
}

/// Form fields for a checkout session.
#[must_use]
pub fn checkout_session_form(request: &CheckoutSessionRequest) -> Form {
    let mut form = Form::new();
    push(&mut form, "mode", "payment");
    push(&mut form, "locale", "pl");

    match &request.payer {
        Payer::Customer(id) => push(&mut form, "customer", id.as_str()),
        Payer::Email(email) => push(&mut form, "customer_email", email.as_str()),
        Payer::Anonymous => {}
    }

    match &request.line_item.price {
        LinePrice::Catalog(price_id) => push(&mut form, "line_items[0][price]", price_id.as_str()),
        LinePrice::Inline { amount, name } => {
            push(&mut form, "line_items[0][price_data][currency]", CURRENCY);
            push(
                &mut form,
                "line_items[0][price_data][unit_amount]",
                amount.to_string(),
            );
            push(
                &mut form,
                "line_items[0][price_data][product_data][name]",
                name.as_str(),
            );
        }
    }
    push(
        &mut form,
        "line_items[0][quantity]",
        request.line_item.quantity.to_string(),
    );

    push(&mut form, "success_url", request.success_url.as_str());
    push(&mut form, "cancel_url", request.cancel_url.as_str());

    if let Some(shipping) = &request.shipping {
        for (i, country) in shipping.allowed_countries.iter().enumerate() {
            push(
                &mut form,
                format!("shipping_address_collection[allowed_countries][{i}]"),
                *country,
            );
        }
        let rate = "shipping_options[0][shipping_rate_data]";
        push(&mut form, format!("{rate}[type]"), "fixed_amount");
        push(
            &mut form,
            format!("{rate}[display_name]"),
            shipping.display_name.as_str(),
        );
        push(
            &mut form,
            format!("{rate}[fixed_amount][amount]"),
            shipping.amount.to_string(),
        );
        push(&mut form, format!("{rate}[fixed_amount][currency]"), CURRENCY);
    }

    if request.collect_details {
        push(&mut form, "customer_update[address]", "auto");
        push(&mut form, "customer_update[shipping]", "auto");
        push(&mut form, "customer_update[name]", "auto");
        push(&mut form, "phone_number_collection[enabled]", "true");
        push(&mut form, "billing_address_collection", "required");
        push(&mut form, "allow_promotion_codes", "true");
    }

    for (key, value) in &request.metadata {
        push(&mut form, format!("metadata[{key}]"), value.as_str());
    }

    form
}

#[async_trait]
impl PaymentGateway for StripeClient {
    async fn find_customer(&self, email: &Email) -> Result<Option<Customer>, PaymentError> {
        let mut url = Url::parse(&format!("{}/customers", self.base_url))
            .map_err(|e| PaymentError::Parse(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("email", email.as_str())
            .append_pair("limit", "1");

        let response = self.client.get(url).send().await?;
        let list: CustomerList = Self::read(response).await?;
        Ok(list.data.into_iter().next().map(Customer::from))
    }

    async fn create_customer(&self, customer: &NewCustomer) -> Result<Customer, PaymentError> {
        let created: CustomerObject = self
            .post_form("/customers", &customer_form(customer))
            .await?;
        Ok(created.into())
    }

    async fn update_customer(
        &self,
        customer_id: &str,
        update: &CustomerUpdate,
    ) -> Result<(), PaymentError> {
        let _: CustomerObject = self
            .post_form(
                &format!("/customers/{customer_id}"),
                &customer_update_form(update),
            )
            .await?;
        Ok(())
    }

    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let session: SessionObject = self
            .post_form("/checkout/sessions", &checkout_session_form(request))
            .await?;

        tracing::info!(session_id = %session.id, "Checkout session created");

        Ok(CheckoutSession {
            url: session.url.ok_or(PaymentError::MissingUrl)?,
            id: session.id,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use super::super::{LineItem, ShippingOffer};
    use super::*;

    fn value<'a>(form: &'a Form, key: &str) -> Option<&'a str> {
        form.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn request() -> CheckoutSessionRequest {
        CheckoutSessionRequest {
            payer: Payer::Customer("cus_123".to_owned()),
            line_item: LineItem {
                price: LinePrice::Inline {
                    amount: 14_900,
                    name: "Kurs".to_owned(),
                },
                quantity: 2,
            },
            success_url: "https://example.pl/success".to_owned(),
            cancel_url: "https://example.pl/checkout?canceled=1".to_owned(),
            shipping: None,
            collect_details: false,
            metadata: BTreeMap::from([("user_email".to_owned(), "a@b.pl".to_owned())]),
        }
    }

    #[test]
    fn test_inline_price_form() {
        let form = checkout_session_form(&request());
        assert_eq!(value(&form, "mode"), Some("payment"));
        assert_eq!(value(&form, "locale"), Some("pl"));
        assert_eq!(value(&form, "customer"), Some("cus_123"));
        assert_eq!(value(&form, "line_items[0][price_data][currency]"), Some("pln"));
        assert_eq!(
            value(&form, "line_items[0][price_data][unit_amount]"),
            Some("14900")
        );
        assert_eq!(value(&form, "line_items[0][quantity]"), Some("2"));
        assert_eq!(value(&form, "metadata[user_email]"), Some("a@b.pl"));
        assert_eq!(value(&form, "allow_promotion_codes"), None);
    }

    #[test]
    fn test_shipping_and_details_form() {
        let mut req = request();
        req.line_item.price = LinePrice::Catalog("price_book".to_owned());
        req.shipping = Some(ShippingOffer {
            allowed_countries: vec!["PL"],
            display_name: "Paczkomat InPost".to_owned(),
            amount: 1200,
        });
        req.collect_details = true;

        let form = checkout_session_form(&req);
        assert_eq!(value(&form, "line_items[0][price]"), Some("price_book"));
        assert_eq!(
            value(&form, "shipping_address_collection[allowed_countries][0]"),
            Some("PL")
        );
        assert_eq!(
            value(&form, "shipping_options[0][shipping_rate_data][fixed_amount][amount]"),
            Some("1200")
        );
        assert_eq!(value(&form, "billing_address_collection"), Some("required"));
        assert_eq!(value(&form, "phone_number_collection[enabled]"), Some("true"));
    }

    #[test]
    fn test_customer_update_form_only_set_fields() {
        let form = customer_update_form(&CustomerUpdate {
            phone: Some("+48600100200".to_owned()),
            ..CustomerUpdate::default()
        });
        assert_eq!(form, vec![("phone".to_owned(), "+48600100200".to_owned())]);
    }
}
