use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientDoc {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,

    pub patient_id: Uuid,
    #[serde(default, deserialize_with = "super::lenient::string")]
    pub file_name: String,
    #[serde(default, deserialize_with = "super::lenient::string")]
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientImage {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,

    pub patient_id: Uuid,
    /// xray, photo, scan or document
    #[serde(rename = "type", default, deserialize_with = "super::lenient::string")]
    pub kind: String,
    #[serde(default, deserialize_with = "super::lenient::string")]
    pub title: String,
    #[serde(default, deserialize_with = "super::lenient::string")]
    pub description: String,
    #[serde(default, deserialize_with = "super::lenient::string")]
    pub url: String,
    #[serde(default, deserialize_with = "super::lenient::string")]
    pub file_name: String,
    #[serde(default)]
    pub file_size: i64,
    #[serde(default, deserialize_with = "super::lenient::string")]
    pub mime_type: String,
    #[serde(default)]
    pub tooth_number: Option<i32>,
    /// before_treatment, during_treatment, after_treatment or diagnostic
    #[serde(default, deserialize_with = "super::lenient::string")]
    pub category: String,
    #[serde(default, deserialize_with = "super::lenient::boolean")]
    pub is_public: bool,
    #[serde(default)]
    pub created_by: Option<Uuid>,
}
