use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::billing::{
    parse_event, verify_signature, BillingProvider, CheckoutRequest, NewCustomer, PriceSummary, ProductSummary,
    StripeSubscription, WebhookEvent,
};
use crate::config::{AppConfig, BillingConfig, ServerConfig};
use crate::database::models::subscription::FREE_PLAN;
use crate::database::models::{Doctor, Subscription};
use crate::error::ApiError;
use crate::store::RecordStore;

use super::subscription_service::SubscriptionService;
use super::TenantService;

/// Body of `POST /api/stripe/create-checkout-session`
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutStarted {
    pub url: String,
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

/// Checkout, portal and webhook reconciliation against the payment processor
pub struct BillingService {
    provider: Arc<dyn BillingProvider>,
    tenants: TenantService,
    subscriptions: SubscriptionService,
    server: ServerConfig,
    billing: BillingConfig,
}

impl BillingService {
    pub fn new(store: Arc<dyn RecordStore>, provider: Arc<dyn BillingProvider>, config: &AppConfig) -> Self {
        Self {
            provider,
            tenants: TenantService::new(store.clone()),
            subscriptions: SubscriptionService::new(store),
            server: config.server.clone(),
            billing: config.billing.clone(),
        }
    }

    async fn doctor_for(&self, user_id: Uuid) -> Result<Doctor, ApiError> {
        self.tenants
            .find_doctor(user_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Doctor not found"))
    }

    pub async fn checkout(&self, user_id: Uuid, price_id: &str) -> Result<CheckoutStarted, ApiError> {
        if price_id.trim().is_empty() {
            return Err(ApiError::bad_request("Price ID is required"));
        }
        let doctor = self.doctor_for(user_id).await?;

        let subscription = match self.subscriptions.for_doctor(doctor.id).await? {
            Some(existing) => existing,
            None => Subscription::placeholder(doctor.id, FREE_PLAN, "inactive"),
        };

        self.provider.retrieve_price(price_id).await.map_err(|e| {
            warn!("Checkout with unknown price {}: {}", price_id, e);
            ApiError::bad_request("Invalid price ID")
        })?;

        let customer_id = if subscription.stripe_customer_id.is_empty() {
            let customer = self
                .provider
                .create_customer(NewCustomer {
                    email: doctor.email.clone(),
                    name: doctor.name.clone(),
                    doctor_id: doctor.id,
                })
                .await?;
            info!("Created billing customer {} for doctor {}", customer.id, doctor.id);
            customer.id
        } else {
            subscription.stripe_customer_id.clone()
        };

        let session = self
            .provider
            .create_checkout_session(CheckoutRequest {
                price_id: price_id.to_string(),
                customer_id: Some(customer_id),
                client_reference_id: Some(doctor.user_id.to_string()),
                success_url: format!(
                    "{}/api/stripe/checkout-success?session_id={{CHECKOUT_SESSION_ID}}",
                    self.server.base_url
                ),
                cancel_url: format!("{}/dashboard", self.server.base_url),
            })
            .await?;

        let url = session
            .url
            .ok_or_else(|| ApiError::upstream("Checkout session without url", &session.id))?;
        // clients open sessionId directly, so it carries the url as well
        Ok(CheckoutStarted { session_id: url.clone(), url })
    }

    pub async fn portal(&self, user_id: Uuid) -> Result<String, ApiError> {
        let doctor = self.doctor_for(user_id).await?;
        let subscription = self
            .subscriptions
            .for_doctor(doctor.id)
            .await?
            .filter(|s| !s.stripe_customer_id.is_empty())
            .ok_or_else(|| ApiError::not_found("No active subscription found"))?;

        let return_url = format!("{}/dashboard", self.server.base_url);
        let session = self
            .provider
            .create_portal_session(&subscription.stripe_customer_id, &return_url)
            .await?;
        Ok(session.url)
    }

    /// Verifies and applies one webhook delivery
    pub async fn handle_webhook(&self, payload: &[u8], signature: Option<&str>) -> Result<(), ApiError> {
        let secret = self
            .billing
            .webhook_secret
            .as_deref()
            .ok_or_else(|| ApiError::internal_server_error("Webhook secret not configured"))?;
        let signature = signature
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ApiError::bad_request("No signature found"))?;

        let event = parse_event(payload)?;
        verify_signature(
            payload,
            signature,
            secret,
            self.billing.webhook_tolerance_secs,
            Utc::now().timestamp(),
        )?;

        if let Some(version) = event.api_version.as_deref() {
            if version != self.billing.api_version {
                warn!(
                    "Webhook {} uses API version {}, expected {}; continuing",
                    event.id, version, self.billing.api_version
                );
            }
        }

        self.dispatch(&event).await
    }

    async fn dispatch(&self, event: &WebhookEvent) -> Result<(), ApiError> {
        match event.kind.as_str() {
            "customer.subscription.created" | "customer.subscription.updated" | "customer.subscription.deleted" => {
                let subscription_id = event
                    .object_id()
                    .ok_or_else(|| ApiError::bad_request("Invalid webhook payload"))?;
                info!("Handling subscription event {} for {}", event.kind, subscription_id);
                self.sync_subscription(subscription_id).await.map_err(|e| {
                    warn!("Failed to handle subscription change {}: {}", subscription_id, e);
                    ApiError::internal_server_error("Failed to handle subscription change")
                })
            }
            kind if kind.starts_with("price.") => {
                info!("Received price event: {}", kind);
                Ok(())
            }
            kind if kind.starts_with("product.") => {
                info!("Received product event: {}", kind);
                Ok(())
            }
            kind => {
                info!("Unhandled event type: {}", kind);
                Ok(())
            }
        }
    }

    /// Copies the provider's view of a subscription onto the local row for its customer
    async fn sync_subscription(&self, subscription_id: &str) -> Result<(), ApiError> {
        let remote = self.provider.retrieve_subscription(subscription_id).await?;
        let customer_id = remote.customer.id();
        let local = self
            .subscriptions
            .by_customer(customer_id)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("Subscription not found for customer: {}", customer_id)))?;

        let mut changes = Map::new();
        changes.insert("subscription_status".into(), json!(remote.status));
        changes.insert("stripe_subscription_id".into(), json!(remote.id));

        match remote.status.as_str() {
            "active" | "trialing" => {
                if let Some(price) = remote.first_price() {
                    let product_id = price.product.id();
                    changes.insert("stripe_product_id".into(), json!(product_id));
                    match self.provider.retrieve_product(product_id).await {
                        Ok(product) => {
                            changes.insert("plan_name".into(), json!(product.name));
                        }
                        Err(e) => warn!("Could not load product {}: {}", product_id, e),
                    }
                }
            }
            "canceled" | "unpaid" => {
                for column in ["stripe_subscription_id", "stripe_product_id", "plan_name"] {
                    changes.insert(column.into(), json!(""));
                }
            }
            _ => {}
        }

        self.subscriptions.apply(local.id, Value::Object(changes)).await?;
        info!("Updated subscription {} status to {}", local.id, remote.status);
        Ok(())
    }

    /// Records a completed checkout and returns where to send the browser
    pub async fn complete_checkout(&self, session_id: Option<&str>) -> Result<String, ApiError> {
        let session_id = session_id
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ApiError::bad_request("Session ID is required"))?;

        let session = self.provider.retrieve_checkout_session(session_id).await?;
        let reference = session
            .client_reference_id
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ApiError::bad_request("No user ID found in session"))?;
        let user_id = Uuid::parse_str(reference).map_err(|_| ApiError::bad_request("Invalid user ID in session"))?;
        let doctor = self.doctor_for(user_id).await?;

        let subscription: Option<StripeSubscription> = match &session.subscription {
            Some(expandable) => match expandable.object() {
                Some(sub) => Some(sub.clone()),
                None => Some(self.provider.retrieve_subscription(expandable.id()).await?),
            },
            None => None,
        };

        let mut fields = Map::new();
        fields.insert(
            "stripe_customer_id".into(),
            json!(session.customer.as_ref().map(|c| c.id().to_string()).unwrap_or_default()),
        );
        fields.insert(
            "stripe_subscription_id".into(),
            json!(subscription.as_ref().map(|s| s.id.clone()).unwrap_or_default()),
        );
        fields.insert(
            "subscription_status".into(),
            json!(subscription.as_ref().map(|s| s.status.clone()).unwrap_or_default()),
        );

        let price = subscription.as_ref().and_then(|s| s.first_price());
        let plan_name = price
            .and_then(|p| p.product.object())
            .map(|product| product.name.clone())
            .unwrap_or_default();
        fields.insert("plan_name".into(), json!(plan_name));
        if let Some(price) = price {
            fields.insert("stripe_product_id".into(), json!(price.product.id()));
        }

        self.subscriptions
            .upsert_for_doctor(doctor.id, Value::Object(fields))
            .await?;
        info!("Checkout {} completed for doctor {}", session.id, doctor.id);

        Ok(format!("{}/dashboard", self.server.frontend_url))
    }

    pub async fn prices(&self) -> Result<Vec<PriceSummary>, ApiError> {
        let prices = self.provider.list_prices().await?;
        Ok(prices.iter().map(PriceSummary::from).collect())
    }

    pub async fn products(&self) -> Result<Vec<ProductSummary>, ApiError> {
        let products = self.provider.list_products().await?;
        Ok(products.iter().map(ProductSummary::from).collect())
    }
}
