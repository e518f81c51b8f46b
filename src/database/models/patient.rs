use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Doctor;

/// Patient row. Patients belong to doctors only through [`PatientDoctor`] rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub details: PatientDetails,
}

/// Client-editable patient fields; the create and update bodies decode straight into this
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatientDetails {
    #[serde(default, deserialize_with = "super::lenient::string")]
    pub name: String,
    #[serde(default, deserialize_with = "super::lenient::string")]
    pub email: String,
    #[serde(default, deserialize_with = "super::lenient::string")]
    pub phone: String,
    #[serde(default, with = "super::flexible_date")]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default, deserialize_with = "super::lenient::string")]
    pub address: String,
    #[serde(default, deserialize_with = "super::lenient::string")]
    pub medical_history: String,
    #[serde(default, deserialize_with = "super::lenient::string")]
    pub notes: String,
    #[serde(default, deserialize_with = "super::lenient::string")]
    pub cpf: String,

    // Personal information
    #[serde(default, deserialize_with = "super::lenient::string")]
    pub emergency_contact: String,
    #[serde(default, deserialize_with = "super::lenient::string")]
    pub emergency_phone: String,
    #[serde(default, deserialize_with = "super::lenient::string")]
    pub profession: String,
    #[serde(default, deserialize_with = "super::lenient::string")]
    pub civil_status: String,
    #[serde(default, deserialize_with = "super::lenient::string")]
    pub gender: String,

    // Medical history
    #[serde(default, deserialize_with = "super::lenient::string")]
    pub allergies: String,
    #[serde(default, deserialize_with = "super::lenient::string")]
    pub medications: String,
    #[serde(default, deserialize_with = "super::lenient::string")]
    pub diseases: String,
    #[serde(default, deserialize_with = "super::lenient::string")]
    pub surgeries: String,
    #[serde(default, deserialize_with = "super::lenient::string")]
    pub family_history: String,

    // Dental history
    #[serde(default, with = "super::flexible_date")]
    pub last_cleaning_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "super::lenient::boolean")]
    pub orthodontic_treatment: bool,
    #[serde(default, deserialize_with = "super::lenient::string")]
    pub previous_dentist: String,
    #[serde(default, deserialize_with = "super::lenient::string")]
    pub chief_complaint: String,
    #[serde(default, deserialize_with = "super::lenient::int")]
    pub pain_level: i32,
    #[serde(default, deserialize_with = "super::lenient::boolean")]
    pub sensitivity: bool,

    // Insurance
    #[serde(default, deserialize_with = "super::lenient::string")]
    pub insurance_provider: String,
    #[serde(default, deserialize_with = "super::lenient::string")]
    pub insurance_number: String,
    #[serde(default, deserialize_with = "super::lenient::string")]
    pub insurance_coverage: String,
    #[serde(default, with = "super::flexible_date")]
    pub insurance_expiration: Option<NaiveDate>,

    // Habits
    #[serde(default, deserialize_with = "super::lenient::boolean")]
    pub smoking: bool,
    #[serde(default, deserialize_with = "super::lenient::boolean")]
    pub alcohol: bool,
    #[serde(default, deserialize_with = "super::lenient::boolean")]
    pub drugs: bool,
    #[serde(default, deserialize_with = "super::lenient::boolean")]
    pub bruxism: bool,
}

/// Assignment granting a doctor access to a patient
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientDoctor {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    #[serde(default, deserialize_with = "super::lenient::boolean")]
    pub is_primary_doctor: bool,
    pub assigned_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "super::lenient::string")]
    pub notes: String,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor: Option<Doctor>,
}
