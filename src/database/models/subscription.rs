use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const FREE_PLAN: &str = "Free Plan";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: Uuid,
    pub doctor_id: Uuid,
    #[serde(default, deserialize_with = "super::lenient::string")]
    pub plan_name: String,
    #[serde(default, deserialize_with = "super::lenient::string")]
    pub stripe_customer_id: String,
    #[serde(default, deserialize_with = "super::lenient::string")]
    pub stripe_subscription_id: String,
    #[serde(default, deserialize_with = "super::lenient::string")]
    pub stripe_product_id: String,
    #[serde(default, deserialize_with = "super::lenient::string")]
    pub subscription_status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Subscription {
    /// Unsaved row standing in for a doctor that has no subscription yet
    pub fn placeholder(doctor_id: Uuid, plan_name: &str, status: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            doctor_id,
            plan_name: plan_name.to_string(),
            stripe_customer_id: String::new(),
            stripe_subscription_id: String::new(),
            stripe_product_id: String::new(),
            subscription_status: status.to_string(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }
}
