// handlers/protected/settings.rs - GET|PUT /api/settings/clinic, GET|PUT /api/settings/user
//
// Settings are not persisted: reads return the defaults, writes are validated and acknowledged.

use axum::extract::{rejection::JsonRejection, Extension};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::handlers::json_body;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::Tenant;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClinicSettings {
    pub user_id: Uuid,
    pub currency: String,
    pub language: String,
    pub timezone: String,
    pub default_appointment_duration: i32,
    pub booking_window: i32,
    pub cancellation_window: i32,
    pub email_notifications: bool,
    pub appointment_reminders: bool,
    pub reminder_hours: i32,
    pub next_invoice_number: i32,
}

impl Default for ClinicSettings {
    fn default() -> Self {
        Self {
            user_id: Uuid::nil(),
            currency: "BRL".into(),
            language: "pt-BR".into(),
            timezone: "America/Sao_Paulo".into(),
            default_appointment_duration: 30,
            booking_window: 30,
            cancellation_window: 24,
            email_notifications: true,
            appointment_reminders: true,
            reminder_hours: 24,
            next_invoice_number: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSettings {
    pub user_id: Uuid,
    pub theme: String,
    pub language: String,
    pub timezone: String,
    pub date_format: String,
    pub time_format: String,
    pub calendar_view: String,
    pub calendar_start: i32,
    pub working_hours_start: String,
    pub working_hours_end: String,
    pub email_notifications: bool,
    pub browser_notifications: bool,
    pub appointment_alerts: bool,
    pub payment_alerts: bool,
    pub compact_mode: bool,
    pub show_patient_photos: bool,
    pub auto_save: bool,
    pub auto_save_interval: i32,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            user_id: Uuid::nil(),
            theme: "light".into(),
            language: "pt-BR".into(),
            timezone: "America/Sao_Paulo".into(),
            date_format: "DD/MM/YYYY".into(),
            time_format: "24h".into(),
            calendar_view: "week".into(),
            calendar_start: 1,
            working_hours_start: "08:00".into(),
            working_hours_end: "18:00".into(),
            email_notifications: true,
            browser_notifications: true,
            appointment_alerts: true,
            payment_alerts: true,
            compact_mode: false,
            show_patient_photos: true,
            auto_save: true,
            auto_save_interval: 30,
        }
    }
}

pub async fn clinic(Extension(tenant): Extension<Tenant>) -> ApiResult<ClinicSettings> {
    info!("Clinic settings requested for user {} (defaults)", tenant.user_id);
    Ok(ApiResponse::success(ClinicSettings { user_id: tenant.user_id, ..Default::default() }))
}

pub async fn update_clinic(
    Extension(tenant): Extension<Tenant>,
    payload: Result<Json<ClinicSettings>, JsonRejection>,
) -> ApiResult<Value> {
    json_body(payload, "Invalid request body")?;
    info!("Clinic settings update for user {} acknowledged, not persisted", tenant.user_id);
    Ok(ApiResponse::message("Settings updated successfully"))
}

pub async fn user(Extension(tenant): Extension<Tenant>) -> ApiResult<UserSettings> {
    info!("User settings requested for user {} (defaults)", tenant.user_id);
    Ok(ApiResponse::success(UserSettings { user_id: tenant.user_id, ..Default::default() }))
}

pub async fn update_user(
    Extension(tenant): Extension<Tenant>,
    payload: Result<Json<UserSettings>, JsonRejection>,
) -> ApiResult<Value> {
    json_body(payload, "Invalid request body")?;
    info!("User settings update for user {} acknowledged, not persisted", tenant.user_id);
    Ok(ApiResponse::message("Settings updated successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn clinic_defaults() {
        let settings = serde_json::to_value(ClinicSettings::default()).unwrap();
        assert_eq!(settings["currency"], "BRL");
        assert_eq!(settings["default_appointment_duration"], 30);
        assert_eq!(settings["reminder_hours"], 24);
    }

    #[test]
    fn partial_update_bodies_decode() {
        let settings: UserSettings = serde_json::from_value(json!({"theme": "dark"})).unwrap();
        assert_eq!(settings.theme, "dark");
        assert_eq!(settings.auto_save_interval, 30);
    }
}
