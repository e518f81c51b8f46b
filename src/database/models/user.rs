use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Account row mirrored from the identity provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    #[serde(default, deserialize_with = "super::lenient::string")]
    pub email: String,
    #[serde(default, deserialize_with = "super::lenient::string")]
    pub name: String,
    #[serde(default, deserialize_with = "super::lenient::string")]
    pub role: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}
