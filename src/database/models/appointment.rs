use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
    InProgress,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no_show",
            AppointmentStatus::InProgress => "in_progress",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "scheduled" => AppointmentStatus::Scheduled,
            "confirmed" => AppointmentStatus::Confirmed,
            "completed" => AppointmentStatus::Completed,
            "cancelled" => AppointmentStatus::Cancelled,
            "no_show" => AppointmentStatus::NoShow,
            "in_progress" => AppointmentStatus::InProgress,
            _ => return None,
        })
    }

    /// Status reached by `POST /api/appointments/{id}/{action}`
    pub fn from_action(action: &str) -> Option<Self> {
        match action {
            "confirm" => Some(AppointmentStatus::Confirmed),
            "complete" => Some(AppointmentStatus::Completed),
            "cancel" => Some(AppointmentStatus::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,

    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub date_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "super::lenient::string")]
    pub status: String,
    #[serde(rename = "type", default, deserialize_with = "super::lenient::string")]
    pub kind: String,
    #[serde(default, deserialize_with = "super::lenient::string")]
    pub notes: String,
    #[serde(default, deserialize_with = "super::lenient::int")]
    pub duration: i32,
    #[serde(default)]
    pub created_by: Option<Uuid>,
    #[serde(default, deserialize_with = "super::lenient::string")]
    pub priority: String,
    #[serde(default, deserialize_with = "super::lenient::string")]
    pub room: String,
    #[serde(default, deserialize_with = "super::lenient::boolean")]
    pub is_first_visit: bool,

    #[serde(default)]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "super::lenient::string")]
    pub cancellation_reason: String,
}

impl Appointment {
    pub fn status(&self) -> Option<AppointmentStatus> {
        AppointmentStatus::parse(&self.status)
    }
}
