//! Payment processor seam: checkout, customer portal, catalogue and webhooks.

pub mod stripe;
pub mod types;
pub mod webhook;

use async_trait::async_trait;
use thiserror::Error;

pub use stripe::StripeClient;
pub use types::{
    CheckoutRequest, CheckoutSession, Customer, Expandable, NewCustomer, PortalSession, Price, PriceSummary,
    Product, ProductSummary, StripeSubscription, WebhookEvent,
};
pub use webhook::{parse_event, sign_payload, verify_signature, WebhookError};

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("billing provider not configured")]
    NotConfigured,

    #[error("billing provider error ({status}) {code}: {message}")]
    Api { status: u16, code: String, message: String },

    #[error("billing provider unreachable: {0}")]
    Transport(String),

    #[error("unexpected billing provider response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for BillingError {
    fn from(err: reqwest::Error) -> Self {
        BillingError::Transport(err.to_string())
    }
}

#[async_trait]
pub trait BillingProvider: Send + Sync {
    async fn create_customer(&self, customer: NewCustomer) -> Result<Customer, BillingError>;

    async fn retrieve_price(&self, price_id: &str) -> Result<Price, BillingError>;

    async fn create_checkout_session(&self, request: CheckoutRequest) -> Result<CheckoutSession, BillingError>;

    async fn create_portal_session(&self, customer_id: &str, return_url: &str) -> Result<PortalSession, BillingError>;

    async fn retrieve_subscription(&self, subscription_id: &str) -> Result<StripeSubscription, BillingError>;

    async fn retrieve_product(&self, product_id: &str) -> Result<Product, BillingError>;

    /// Session with customer, subscription and line-item products expanded
    async fn retrieve_checkout_session(&self, session_id: &str) -> Result<CheckoutSession, BillingError>;

    /// Active recurring prices
    async fn list_prices(&self) -> Result<Vec<Price>, BillingError>;

    /// Active products
    async fn list_products(&self) -> Result<Vec<Product>, BillingError>;
}
