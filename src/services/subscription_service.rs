use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::info;
use uuid::Uuid;

use crate::database::models::subscription::FREE_PLAN;
use crate::database::models::Subscription;
use crate::error::ApiError;
use crate::store::{decode, into_object, Query, RecordStore, StoreError, Table};

/// Body of `POST /api/subscriptions`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscriptionInput {
    #[serde(default)]
    pub plan_name: String,
    #[serde(default)]
    pub stripe_customer_id: String,
    #[serde(default)]
    pub stripe_subscription_id: String,
    #[serde(default)]
    pub stripe_product_id: String,
    #[serde(default)]
    pub subscription_status: String,
}

/// Body of `PUT /api/subscriptions/{id}`; empty fields are ignored
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscriptionPatch {
    #[serde(default)]
    pub plan_name: String,
    #[serde(default)]
    pub subscription_status: String,
    #[serde(default)]
    pub stripe_product_id: String,
}

pub struct SubscriptionService {
    store: Arc<dyn RecordStore>,
}

impl SubscriptionService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    async fn first(&self, query: Query) -> Result<Option<Subscription>, StoreError> {
        self.store.select_one(&query).await?.map(decode).transpose()
    }

    /// Most recent live subscription of a doctor
    pub async fn for_doctor(&self, doctor_id: Uuid) -> Result<Option<Subscription>, StoreError> {
        self.first(
            Query::from(Table::Subscriptions)
                .eq("doctor_id", doctor_id)
                .live()
                .order_desc("created_at"),
        )
        .await
    }

    pub async fn by_customer(&self, customer_id: &str) -> Result<Option<Subscription>, StoreError> {
        self.first(
            Query::from(Table::Subscriptions)
                .eq("stripe_customer_id", customer_id)
                .live()
                .order_desc("created_at"),
        )
        .await
    }

    pub async fn create(&self, doctor_id: Uuid, input: SubscriptionInput) -> Result<Subscription, StoreError> {
        let row = json!({
            "doctor_id": doctor_id,
            "plan_name": input.plan_name,
            "stripe_customer_id": input.stripe_customer_id,
            "stripe_subscription_id": input.stripe_subscription_id,
            "stripe_product_id": input.stripe_product_id,
            "subscription_status": input.subscription_status,
        });
        decode(self.store.insert(Table::Subscriptions, row).await?)
    }

    /// Free-tier row created at signup
    pub async fn create_free(&self, doctor_id: Uuid) -> Result<Subscription, StoreError> {
        let input = SubscriptionInput {
            plan_name: FREE_PLAN.to_string(),
            subscription_status: "active".to_string(),
            ..Default::default()
        };
        self.create(doctor_id, input).await
    }

    pub async fn get(&self, doctor_id: Uuid, id: Uuid) -> Result<Subscription, ApiError> {
        let query = Query::from(Table::Subscriptions).eq("id", id).eq("doctor_id", doctor_id).live();
        self.first(query)
            .await?
            .ok_or_else(|| ApiError::not_found("Subscription not found"))
    }

    pub async fn update(&self, doctor_id: Uuid, id: Uuid, patch: SubscriptionPatch) -> Result<Subscription, ApiError> {
        let mut changes = Map::new();
        for (column, value) in [
            ("plan_name", patch.plan_name),
            ("subscription_status", patch.subscription_status),
            ("stripe_product_id", patch.stripe_product_id),
        ] {
            if !value.trim().is_empty() {
                changes.insert(column.to_string(), Value::String(value));
            }
        }

        let query = Query::from(Table::Subscriptions).eq("id", id).eq("doctor_id", doctor_id).live();
        let updated = self.store.update(&query, Value::Object(changes)).await?;
        match updated.into_iter().next() {
            Some(row) => Ok(decode(row)?),
            None => Err(ApiError::not_found("Subscription not found")),
        }
    }

    /// Applies provider-derived fields to one subscription row
    pub async fn apply(&self, id: Uuid, changes: Value) -> Result<(), StoreError> {
        self.store
            .update(&Query::from(Table::Subscriptions).eq("id", id), changes)
            .await?;
        Ok(())
    }

    /// Updates the doctor's subscription, or inserts one carrying `fields`
    pub async fn upsert_for_doctor(&self, doctor_id: Uuid, fields: Value) -> Result<(), StoreError> {
        match self.for_doctor(doctor_id).await? {
            Some(existing) => self.apply(existing.id, fields).await,
            None => {
                let mut row = into_object(fields)?;
                row.insert("doctor_id".to_string(), json!(doctor_id));
                self.store.insert(Table::Subscriptions, Value::Object(row)).await?;
                info!("Created subscription for doctor {}", doctor_id);
                Ok(())
            }
        }
    }
}
