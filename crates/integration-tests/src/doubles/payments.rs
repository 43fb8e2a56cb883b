//! Fake payment provider.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use guidebook_core::Email;
use guidebook_storefront::services::payments::{
    CheckoutSession, CheckoutSessionRequest, Customer, CustomerUpdate, NewCustomer, PaymentError,
    PaymentGateway,
};

/// Records every call and hands out sequential IDs.
#[derive(Default)]
pub struct FakePaymentGateway {
    customers: Mutex<Vec<(Option<Email>, Customer)>>,
    updates: Mutex<Vec<(String, CustomerUpdate)>>,
    sessions: Mutex<Vec<CheckoutSessionRequest>>,
    failing: AtomicBool,
}

impl FakePaymentGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with an API error.
    pub fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    /// Register an existing customer.
    pub fn add_customer(&self, email: Email, customer: Customer) {
        self.customers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((Some(email), customer));
    }

    /// Customers known to the provider.
    #[must_use]
    pub fn customers(&self) -> Vec<Customer> {
        self.customers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, c)| c.clone())
            .collect()
    }

    /// Customer updates in call order.
    #[must_use]
    pub fn updates(&self) -> Vec<(String, CustomerUpdate)> {
        self.updates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Checkout session requests in call order.
    #[must_use]
    pub fn sessions(&self) -> Vec<CheckoutSessionRequest> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn check(&self) -> Result<(), PaymentError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PaymentError::Api {
                status: 500,
                message: "provider unavailable".to_owned(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentGateway for FakePaymentGateway {
    async fn find_customer(&self, email: &Email) -> Result<Option<Customer>, PaymentError> {
        self.check()?;
        Ok(self
            .customers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|(e, _)| e.as_ref() == Some(email))
            .map(|(_, c)| c.clone()))
    }

    async fn create_customer(&self, customer: &NewCustomer) -> Result<Customer, PaymentError> {
        self.check()?;
        let mut customers = self.customers.lock().unwrap_or_else(PoisonError::into_inner);
        let created = Customer {
            id: format!("cus_{}", customers.len() + 1),
            name: customer.name.clone(),
            phone: customer.phone.clone(),
        };
        customers.push((customer.email.clone(), created.clone()));
        Ok(created)
    }

    async fn update_customer(
        &self,
        customer_id: &str,
        update: &CustomerUpdate,
    ) -> Result<(), PaymentError> {
        self.check()?;
        self.updates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((customer_id.to_owned(), update.clone()));
        Ok(())
    }

    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        self.check()?;
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        sessions.push(request.clone());
        let id = format!("cs_test_{}", sessions.len());
        Ok(CheckoutSession {
            url: format!("https://checkout.example/{id}"),
            id,
        })
    }
}
