use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const TOOTH_STATES: [&str; 8] = [
    "healthy", "cavity", "filled", "crown", "missing", "extracted", "implant", "root_canal",
];

/// FDI two-digit notation: quadrant 1-4, tooth 1-8
pub fn is_valid_tooth_number(n: i32) -> bool {
    (1..=4).contains(&(n / 10)) && (1..=8).contains(&(n % 10))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OdontogramTreatment {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,

    pub patient_id: Uuid,
    #[serde(default, deserialize_with = "super::lenient::decimal")]
    pub price: Decimal,
    #[serde(default, deserialize_with = "super::lenient::string")]
    pub teeth_number: String,
    #[serde(default, deserialize_with = "super::lenient::string")]
    pub treatment_type: String,
    #[serde(default, deserialize_with = "super::lenient::string")]
    pub status: String,
    #[serde(default)]
    pub next_session: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "super::lenient::string")]
    pub observations: String,
    #[serde(default)]
    pub date_of_treatment: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToothState {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,

    pub patient_id: Uuid,
    pub tooth_number: i32,
    #[serde(default, deserialize_with = "super::lenient::string")]
    pub state: String,
    #[serde(default, deserialize_with = "super::lenient::string")]
    pub condition: String,
    #[serde(default, deserialize_with = "super::lenient::string")]
    pub notes: String,
    #[serde(default)]
    pub treatment_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_by: Option<Uuid>,
}
