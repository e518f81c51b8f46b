use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Objects that carry a provider id
pub trait Identified {
    fn id(&self) -> &str;
}

/// A reference the provider returns either as a bare id or, when expanded, as the object
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Expandable<T> {
    Id(String),
    Object(Box<T>),
}

impl<T: Identified> Expandable<T> {
    pub fn id(&self) -> &str {
        match self {
            Expandable::Id(id) => id,
            Expandable::Object(obj) => obj.id(),
        }
    }

    pub fn object(&self) -> Option<&T> {
        match self {
            Expandable::Id(_) => None,
            Expandable::Object(obj) => Some(obj),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct List<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Customer {
    pub id: String,
}

impl Identified for Customer {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Recurring {
    pub interval: String,
    #[serde(default)]
    pub trial_period_days: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Price {
    pub id: String,
    pub product: Expandable<Product>,
    #[serde(default)]
    pub unit_amount: Option<i64>,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub recurring: Option<Recurring>,
    #[serde(default)]
    pub active: bool,
}

impl Identified for Price {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Product {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub default_price: Option<Expandable<Price>>,
    #[serde(default)]
    pub active: bool,
}

impl Identified for Product {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionItem {
    pub price: Price,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscription {
    pub id: String,
    pub customer: Expandable<Customer>,
    pub status: String,
    pub items: List<SubscriptionItem>,
}

impl Identified for StripeSubscription {
    fn id(&self) -> &str {
        &self.id
    }
}

impl StripeSubscription {
    pub fn first_price(&self) -> Option<&Price> {
        self.items.data.first().map(|item| &item.price)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub client_reference_id: Option<String>,
    #[serde(default)]
    pub customer: Option<Expandable<Customer>>,
    #[serde(default)]
    pub subscription: Option<Expandable<StripeSubscription>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PortalSession {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct NewCustomer {
    pub email: String,
    pub name: String,
    pub doctor_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub price_id: String,
    pub customer_id: Option<String>,
    pub client_reference_id: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
}

/// Catalogue entry returned by `GET /api/stripe/prices`
#[derive(Debug, Clone, Serialize)]
pub struct PriceSummary {
    pub id: String,
    pub product_id: String,
    pub unit_amount: Option<i64>,
    pub currency: String,
    pub interval: Option<String>,
    pub trial_period_days: Option<i64>,
}

impl From<&Price> for PriceSummary {
    fn from(price: &Price) -> Self {
        Self {
            id: price.id.clone(),
            product_id: price.product.id().to_string(),
            unit_amount: price.unit_amount,
            currency: price.currency.clone(),
            interval: price.recurring.as_ref().map(|r| r.interval.clone()),
            trial_period_days: price.recurring.as_ref().and_then(|r| r.trial_period_days),
        }
    }
}

/// Catalogue entry returned by `GET /api/stripe/products`
#[derive(Debug, Clone, Serialize)]
pub struct ProductSummary {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_price_id: Option<String>,
}

impl From<&Product> for ProductSummary {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.clone(),
            name: product.name.clone(),
            description: product.description.clone(),
            default_price_id: product.default_price.as_ref().map(|p| p.id().to_string()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub api_version: Option<String>,
    pub data: EventData,
}

impl WebhookEvent {
    /// `data.object.id`, the subscription id for subscription lifecycle events
    pub fn object_id(&self) -> Option<&str> {
        self.data.object.get("id").and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn expandable_reads_id_or_object() {
        let bare: Expandable<Customer> = serde_json::from_value(json!("cus_1")).unwrap();
        assert_eq!(bare.id(), "cus_1");
        assert!(bare.object().is_none());

        let expanded: Expandable<Customer> = serde_json::from_value(json!({"id": "cus_2", "email": "a@b.c"})).unwrap();
        assert_eq!(expanded.id(), "cus_2");
    }

    #[test]
    fn price_summary_flattens_recurring() {
        let price: Price = serde_json::from_value(json!({
            "id": "price_1",
            "product": {"id": "prod_1", "name": "Pro"},
            "unit_amount": 4990,
            "currency": "brl",
            "recurring": {"interval": "month", "trial_period_days": 7},
            "active": true
        }))
        .unwrap();
        let summary = PriceSummary::from(&price);
        assert_eq!(summary.product_id, "prod_1");
        assert_eq!(summary.interval.as_deref(), Some("month"));
        assert_eq!(summary.trial_period_days, Some(7));
    }
}
