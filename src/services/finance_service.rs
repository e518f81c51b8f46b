use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::models::finance::{FINANCE_STATUSES, FINANCE_TYPES};
use crate::database::models::Finance;
use crate::error::ApiError;
use crate::store::{decode, decode_all, soft_delete, Query, RecordStore, Table};

use super::{date_range, non_empty, ListParams, Tenant};

pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Create and update body for finance records
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FinanceInput {
    pub patient_id: Option<Uuid>,
    pub appointment_id: Option<Uuid>,
    #[serde(default, deserialize_with = "crate::database::models::lenient::decimal")]
    pub price: Decimal,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: String,
    pub due_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub payment_method: String,
    #[serde(default, deserialize_with = "crate::database::models::lenient::decimal")]
    pub amount: Decimal,
    #[serde(default, deserialize_with = "crate::database::models::lenient::decimal")]
    pub discount: Decimal,
    #[serde(default, deserialize_with = "crate::database::models::lenient::decimal")]
    pub tax: Decimal,
    #[serde(default, deserialize_with = "crate::database::models::lenient::decimal")]
    pub amount_paid: Decimal,
    pub balance: Option<Decimal>,
    #[serde(default)]
    pub invoice_number: String,
    pub invoice_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub installments: i32,
    #[serde(default, deserialize_with = "crate::database::models::lenient::decimal")]
    pub installment_value: Decimal,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub reference: String,
    #[serde(default)]
    pub is_recurring: bool,
}

impl FinanceInput {
    /// Fills defaults and checks the enumerated columns
    fn normalise(mut self) -> Result<Self, ApiError> {
        if self.kind.trim().is_empty() {
            self.kind = "income".to_string();
        }
        if self.status.trim().is_empty() {
            self.status = "pending".to_string();
        }
        if !FINANCE_TYPES.contains(&self.kind.as_str()) {
            return Err(ApiError::validation_error("Invalid finance type", Some("type")));
        }
        if !FINANCE_STATUSES.contains(&self.status.as_str()) {
            return Err(ApiError::validation_error("Invalid finance status", Some("status")));
        }
        if self.amount.is_sign_negative() {
            return Err(ApiError::validation_error("Amount must not be negative", Some("amount")));
        }
        if self.balance.is_none() {
            let balance = self
                .amount
                .checked_sub(self.discount)
                .and_then(|b| b.checked_add(self.tax))
                .and_then(|b| b.checked_sub(self.amount_paid))
                .ok_or_else(|| ApiError::validation_error("Invalid amount", Some("amount")))?;
            self.balance = Some(balance);
        }
        Ok(self)
    }

    fn to_row(&self) -> Value {
        json!({
            "patient_id": self.patient_id,
            "appointment_id": self.appointment_id,
            "price": self.price,
            "description": self.description,
            "status": self.status,
            "due_at": self.due_at,
            "paid_at": self.paid_at,
            "type": self.kind,
            "category": self.category,
            "payment_method": self.payment_method,
            "amount": self.amount,
            "discount": self.discount,
            "tax": self.tax,
            "amount_paid": self.amount_paid,
            "balance": self.balance.unwrap_or_default(),
            "invoice_number": self.invoice_number,
            "invoice_date": self.invoice_date,
            "installments": self.installments,
            "installment_value": self.installment_value,
            "notes": self.notes,
            "reference": self.reference,
            "is_recurring": self.is_recurring,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FinancePage {
    pub finances: Vec<Finance>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

pub struct FinanceService {
    store: Arc<dyn RecordStore>,
}

impl FinanceService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    fn scoped(tenant: &Tenant, id: Uuid) -> Query {
        Query::from(Table::Finances)
            .eq("id", id)
            .eq("doctor_id", tenant.doctor_id)
            .live()
    }

    /// Best-effort audit row; failures are only logged
    async fn log_activity(&self, tenant: &Tenant, action: &str, ip_address: &str) {
        let row = json!({
            "user_id": tenant.user_id,
            "action": action,
            "ip_address": ip_address,
        });
        if let Err(e) = self.store.insert(Table::ActivityLogs, row).await {
            warn!("Failed to record {} activity for {}: {}", action, tenant.user_id, e);
        }
    }

    pub async fn create(&self, tenant: &Tenant, input: FinanceInput, ip_address: &str) -> Result<Finance, ApiError> {
        let input = input.normalise()?;
        let mut row = input.to_row();
        row["doctor_id"] = json!(tenant.doctor_id);
        row["created_by"] = json!(tenant.user_id);

        let finance: Finance = decode(self.store.insert(Table::Finances, row).await?)?;
        info!("Created finance record {} for doctor {}", finance.id, tenant.doctor_id);
        self.log_activity(tenant, "CreateFinance", ip_address).await;
        Ok(finance)
    }

    pub async fn get(&self, tenant: &Tenant, id: Uuid) -> Result<Finance, ApiError> {
        match self.store.select_one(&Self::scoped(tenant, id)).await? {
            Some(row) => Ok(decode(row)?),
            None => Err(ApiError::not_found("Finance record not found")),
        }
    }

    pub async fn list(&self, tenant: &Tenant, params: &ListParams) -> Result<FinancePage, ApiError> {
        let paging = params.paging(DEFAULT_PAGE_SIZE);
        let mut query = Query::from(Table::Finances)
            .eq("doctor_id", tenant.doctor_id)
            .live()
            .order_asc("due_at");

        if let Some(search) = non_empty(&params.search) {
            query = query.contains("description", search);
        }
        if let Some(status) = non_empty(&params.status) {
            query = query.eq("status", status);
        }
        query = date_range(query, "due_at", non_empty(&params.start_date), non_empty(&params.end_date));
        if let Some(patient_id) = non_empty(&params.patient_id).and_then(|s| Uuid::parse_str(s).ok()) {
            query = query.eq("patient_id", patient_id);
        }

        let total = self.store.count(&query).await?;
        let finances = decode_all(self.store.select(&paging.apply(query)).await?)?;
        Ok(FinancePage { finances, total, page: paging.page, limit: paging.limit })
    }

    /// Every live record of the tenant, used by reports
    pub async fn all(&self, tenant: &Tenant) -> Result<Vec<Finance>, ApiError> {
        let query = Query::from(Table::Finances).eq("doctor_id", tenant.doctor_id).live();
        Ok(decode_all(self.store.select(&query).await?)?)
    }

    pub async fn update(&self, tenant: &Tenant, id: Uuid, input: FinanceInput, ip_address: &str) -> Result<(), ApiError> {
        let input = input.normalise()?;
        let updated = self.store.update(&Self::scoped(tenant, id), input.to_row()).await?;
        if updated.is_empty() {
            return Err(ApiError::not_found("Finance record not found"));
        }
        self.log_activity(tenant, "UpdateFinance", ip_address).await;
        Ok(())
    }

    pub async fn delete(&self, tenant: &Tenant, id: Uuid, ip_address: &str) -> Result<(), ApiError> {
        let updated = self.store.update(&Self::scoped(tenant, id), soft_delete()).await?;
        if updated.is_empty() {
            return Err(ApiError::not_found("Finance record not found"));
        }
        self.log_activity(tenant, "DeleteFinance", ip_address).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn money(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn setup() -> (Arc<MemoryStore>, FinanceService, Tenant) {
        let store = Arc::new(MemoryStore::new());
        let tenant = Tenant { doctor_id: Uuid::new_v4(), user_id: Uuid::new_v4() };
        (store.clone(), FinanceService::new(store), tenant)
    }

    fn input(description: &str) -> FinanceInput {
        FinanceInput {
            description: description.into(),
            amount: money("200.00"),
            discount: money("20.00"),
            tax: money("5.00"),
            amount_paid: money("50.00"),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_fills_defaults_and_balance() {
        let (store, service, tenant) = setup();
        let f = service.create(&tenant, input("Cleaning"), "127.0.0.1").await.unwrap();
        assert_eq!(f.kind, "income");
        assert_eq!(f.status, "pending");
        assert_eq!(f.balance, money("135.00"));
        assert_eq!(f.created_by, Some(tenant.user_id));

        let logs = store.dump(Table::ActivityLogs).await;
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0]["action"], "CreateFinance");
    }

    #[tokio::test]
    async fn overflowing_amounts_are_rejected() {
        let (store, service, tenant) = setup();
        let mut body = input("Huge");
        body.amount = Decimal::MAX;
        body.discount = Decimal::ZERO;
        body.tax = Decimal::MAX;
        let err = service.create(&tenant, body, "").await.unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.message(), "Invalid amount");
        assert!(store.dump(Table::Finances).await.is_empty());
    }

    #[tokio::test]
    async fn rejects_unknown_status() {
        let (_, service, tenant) = setup();
        let mut body = input("x");
        body.status = "refunded".into();
        assert_eq!(service.create(&tenant, body, "").await.unwrap_err().status_code(), 400);
    }

    #[tokio::test]
    async fn list_searches_and_pages() {
        let (_, service, tenant) = setup();
        for i in 0..15 {
            service.create(&tenant, input(&format!("Implant {}", i)), "").await.unwrap();
        }
        service.create(&tenant, input("Whitening"), "").await.unwrap();

        let params = ListParams { search: Some("implant".into()), page: Some("2".into()), ..Default::default() };
        let page = service.list(&tenant, &params).await.unwrap();
        assert_eq!(page.total, 15);
        assert_eq!(page.finances.len(), 5);
        assert_eq!((page.page, page.limit), (2, 10));
    }

    #[tokio::test]
    async fn records_are_scoped_to_the_doctor() {
        let (_, service, tenant) = setup();
        let f = service.create(&tenant, input("Crown"), "").await.unwrap();
        let other = Tenant { doctor_id: Uuid::new_v4(), user_id: Uuid::new_v4() };
        assert_eq!(service.get(&other, f.id).await.unwrap_err().message(), "Finance record not found");
        assert_eq!(service.delete(&other, f.id, "").await.unwrap_err().status_code(), 404);
    }

    #[tokio::test]
    async fn delete_is_soft() {
        let (store, service, tenant) = setup();
        let f = service.create(&tenant, input("Crown"), "").await.unwrap();
        service.delete(&tenant, f.id, "").await.unwrap();
        assert!(service.get(&tenant, f.id).await.is_err());
        assert_eq!(store.dump(Table::Finances).await.len(), 1);
    }
}
