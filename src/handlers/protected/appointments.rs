// handlers/protected/appointments.rs - the doctor's calendar
//
// GET|POST /api/appointments, GET|PUT|DELETE /api/appointments/:id,
// POST /api/appointments/:id/:action (confirm, complete, cancel)

use axum::body::Bytes;
use axum::extract::{rejection::JsonRejection, Extension, Path, Query, State};
use axum::Json;
use serde_json::Value;

use crate::app::AppState;
use crate::database::models::Appointment;
use crate::handlers::{json_body, optional_body, parse_id};
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::appointment_service::{AppointmentPage, AppointmentPatch, CancelBody, NewAppointment};
use crate::services::{ListParams, Tenant};

pub async fn create(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    payload: Result<Json<NewAppointment>, JsonRejection>,
) -> ApiResult<Appointment> {
    let body = json_body(payload, "Invalid request body")?;
    Ok(ApiResponse::created(state.appointments().create(&tenant, body).await?))
}

/// GET /api/appointments?date=&start_date=&end_date=&patient_id=&status=&page=&limit=
pub async fn list(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    Query(params): Query<ListParams>,
) -> ApiResult<AppointmentPage> {
    Ok(ApiResponse::success(state.appointments().list(&tenant, &params).await?))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    Path(id): Path<String>,
) -> ApiResult<Appointment> {
    let id = parse_id(&id, "Invalid ID")?;
    Ok(ApiResponse::success(state.appointments().get(&tenant, id).await?))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    Path(id): Path<String>,
    payload: Result<Json<AppointmentPatch>, JsonRejection>,
) -> ApiResult<Value> {
    let id = parse_id(&id, "Invalid ID")?;
    let patch = json_body(payload, "Invalid request body")?;
    state.appointments().update(&tenant, id, patch).await?;
    Ok(ApiResponse::message("Appointment updated successfully"))
}

/// POST /api/appointments/:id/:action - `cancel` accepts an optional `{reason}` body
pub async fn action(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    Path((id, action)): Path<(String, String)>,
    body: Bytes,
) -> ApiResult<Value> {
    let id = parse_id(&id, "Invalid ID")?;
    let cancel: CancelBody = optional_body(&body);
    let status = state.appointments().apply_action(&tenant, id, &action, cancel).await?;
    Ok(ApiResponse::message(format!("Appointment {} successfully", status.as_str())))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let id = parse_id(&id, "Invalid ID")?;
    state.appointments().delete(&tenant, id).await?;
    Ok(ApiResponse::no_content())
}
