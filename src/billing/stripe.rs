use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::config::BillingConfig;

use super::types::{
    CheckoutRequest, CheckoutSession, Customer, List, NewCustomer, PortalSession, Price, Product, StripeSubscription,
};
use super::{BillingError, BillingProvider};

const API_BASE: &str = "https://api.stripe.com/v1";

#[derive(Debug, Default, Deserialize)]
struct StripeErrorBody {
    #[serde(default)]
    error: StripeErrorDetail,
}

#[derive(Debug, Default, Deserialize)]
struct StripeErrorDetail {
    #[serde(default)]
    code: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Form-encoded REST client for the payment processor
pub struct StripeClient {
    client: Client,
    base_url: String,
    secret_key: String,
    api_version: String,
}

impl StripeClient {
    pub fn new(config: &BillingConfig) -> Result<Self, BillingError> {
        Self::with_base_url(config, API_BASE)
    }

    pub fn with_base_url(config: &BillingConfig, base_url: &str) -> Result<Self, BillingError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            secret_key: config.secret_key.clone(),
            api_version: config.api_version.clone(),
        })
    }

    fn authorized(&self, builder: RequestBuilder) -> Result<RequestBuilder, BillingError> {
        if self.secret_key.is_empty() {
            return Err(BillingError::NotConfigured);
        }
        Ok(builder
            .bearer_auth(&self.secret_key)
            .header("Stripe-Version", &self.api_version))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T, BillingError> {
        let builder = self.authorized(self.client.get(format!("{}{}", self.base_url, path)).query(query))?;
        Self::execute(builder).await
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, form: &[(&str, String)]) -> Result<T, BillingError> {
        let builder = self.authorized(self.client.post(format!("{}{}", self.base_url, path)).form(form))?;
        Self::execute(builder).await
    }

    async fn execute<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T, BillingError> {
        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            let body: StripeErrorBody = serde_json::from_str(&text).unwrap_or_default();
            return Err(BillingError::Api {
                status: status.as_u16(),
                code: body.error.code.or(body.error.kind).unwrap_or_default(),
                message: body.error.message.unwrap_or(text),
            });
        }
        serde_json::from_str(&text).map_err(|e| BillingError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl BillingProvider for StripeClient {
    async fn create_customer(&self, customer: NewCustomer) -> Result<Customer, BillingError> {
        let form = [
            ("email", customer.email),
            ("name", customer.name),
            ("metadata[doctor_id]", customer.doctor_id.to_string()),
        ];
        let created: Customer = self.post("/customers", &form).await?;
        debug!("Created billing customer {}", created.id);
        Ok(created)
    }

    async fn retrieve_price(&self, price_id: &str) -> Result<Price, BillingError> {
        self.get(&format!("/prices/{}", price_id), &[]).await
    }

    async fn create_checkout_session(&self, request: CheckoutRequest) -> Result<CheckoutSession, BillingError> {
        let mut form = vec![
            ("mode", "subscription".to_string()),
            ("payment_method_types[0]", "card".to_string()),
            ("line_items[0][price]", request.price_id),
            ("line_items[0][quantity]", "1".to_string()),
            ("success_url", request.success_url),
            ("cancel_url", request.cancel_url),
            ("allow_promotion_codes", "true".to_string()),
        ];
        if let Some(customer) = request.customer_id {
            form.push(("customer", customer));
        }
        if let Some(reference) = request.client_reference_id {
            form.push(("client_reference_id", reference));
        }
        self.post("/checkout/sessions", &form).await
    }

    async fn create_portal_session(&self, customer_id: &str, return_url: &str) -> Result<PortalSession, BillingError> {
        let form = [("customer", customer_id.to_string()), ("return_url", return_url.to_string())];
        self.post("/billing_portal/sessions", &form).await
    }

    async fn retrieve_subscription(&self, subscription_id: &str) -> Result<StripeSubscription, BillingError> {
        self.get(&format!("/subscriptions/{}", subscription_id), &[]).await
    }

    async fn retrieve_product(&self, product_id: &str) -> Result<Product, BillingError> {
        self.get(&format!("/products/{}", product_id), &[]).await
    }

    async fn retrieve_checkout_session(&self, session_id: &str) -> Result<CheckoutSession, BillingError> {
        self.get(
            &format!("/checkout/sessions/{}", session_id),
            &[
                ("expand[]", "customer"),
                ("expand[]", "subscription"),
                ("expand[]", "subscription.items.data.price.product"),
            ],
        )
        .await
    }

    async fn list_prices(&self) -> Result<Vec<Price>, BillingError> {
        let list: List<Price> = self
            .get(
                "/prices",
                &[("active", "true"), ("type", "recurring"), ("limit", "100"), ("expand[]", "data.product")],
            )
            .await?;
        Ok(list.data)
    }

    async fn list_products(&self) -> Result<Vec<Product>, BillingError> {
        let list: List<Product> = self
            .get("/products", &[("active", "true"), ("limit", "100"), ("expand[]", "data.default_price")])
            .await?;
        Ok(list.data)
    }
}
