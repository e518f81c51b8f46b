use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const FINANCE_STATUSES: [&str; 5] = ["pending", "paid", "overdue", "cancelled", "partial"];
pub const FINANCE_TYPES: [&str; 2] = ["income", "expense"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finance {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,

    #[serde(default, deserialize_with = "super::lenient::decimal")]
    pub price: Decimal,
    #[serde(default, deserialize_with = "super::lenient::string")]
    pub description: String,
    #[serde(default, deserialize_with = "super::lenient::string")]
    pub status: String,
    #[serde(default)]
    pub due_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub patient_id: Option<Uuid>,
    pub doctor_id: Uuid,
    #[serde(default)]
    pub appointment_id: Option<Uuid>,
    #[serde(default)]
    pub created_by: Option<Uuid>,

    #[serde(rename = "type", default, deserialize_with = "super::lenient::string")]
    pub kind: String,
    #[serde(default, deserialize_with = "super::lenient::string")]
    pub category: String,
    #[serde(default, deserialize_with = "super::lenient::string")]
    pub payment_method: String,
    #[serde(default, deserialize_with = "super::lenient::decimal")]
    pub amount: Decimal,
    #[serde(default, deserialize_with = "super::lenient::decimal")]
    pub discount: Decimal,
    #[serde(default, deserialize_with = "super::lenient::decimal")]
    pub tax: Decimal,

    #[serde(default, deserialize_with = "super::lenient::string")]
    pub invoice_number: String,
    #[serde(default)]
    pub invoice_date: Option<DateTime<Utc>>,

    #[serde(default, deserialize_with = "super::lenient::decimal")]
    pub amount_paid: Decimal,
    #[serde(default, deserialize_with = "super::lenient::decimal")]
    pub balance: Decimal,

    #[serde(default, deserialize_with = "super::lenient::int")]
    pub installments: i32,
    #[serde(default, deserialize_with = "super::lenient::decimal")]
    pub installment_value: Decimal,

    #[serde(default, deserialize_with = "super::lenient::string")]
    pub notes: String,
    #[serde(default, deserialize_with = "super::lenient::string")]
    pub reference: String,
    #[serde(default, deserialize_with = "super::lenient::boolean")]
    pub is_recurring: bool,
}
