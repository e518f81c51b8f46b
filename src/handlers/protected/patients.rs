// handlers/protected/patients.rs - patients and doctor assignments
//
// POST /api/patients, GET /api/patients/my, GET|PUT|DELETE /api/patients/:id,
// GET /api/patients/:id/doctors, POST /api/patients/assign,
// DELETE /api/patients/assignments/:id

use axum::extract::{rejection::JsonRejection, Extension, Path, State};
use axum::Json;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::database::models::{Patient, PatientDetails, PatientDoctor};
use crate::handlers::{json_body, parse_id};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::patient_service::{AssignRequest, NewPatient};
use crate::services::Tenant;

/// POST /api/patients - validates, enforces email/CPF uniqueness and assigns the caller
pub async fn create(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    payload: Result<Json<NewPatient>, JsonRejection>,
) -> ApiResult<Patient> {
    let body = json_body(payload, "Invalid request body")?;
    Ok(ApiResponse::created(state.patients().create(&tenant, body).await?))
}

pub async fn my_patients(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Value> {
    let patients = state.patients().my_patients(&tenant).await?;
    Ok(ApiResponse::success(json!({ "patients": patients, "user": user.public_json() })))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    Path(id): Path<String>,
) -> ApiResult<Patient> {
    let id = parse_id(&id, "Invalid patient ID")?;
    Ok(ApiResponse::success(state.patients().get(&tenant, id).await?))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    Path(id): Path<String>,
    payload: Result<Json<PatientDetails>, JsonRejection>,
) -> ApiResult<Patient> {
    let id = parse_id(&id, "Invalid patient ID")?;
    let details = json_body(payload, "Invalid request body")?;
    Ok(ApiResponse::success(state.patients().update(&tenant, id, details).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let id = parse_id(&id, "Invalid patient ID")?;
    state.patients().delete(&tenant, id).await?;
    Ok(ApiResponse::no_content())
}

pub async fn doctors(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    let id = parse_id(&id, "Invalid patient ID")?;
    let assignments = state.patients().doctors(&tenant, id).await?;
    Ok(ApiResponse::success(json!({ "patient_doctors": assignments })))
}

pub async fn assign(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    payload: Result<Json<AssignRequest>, JsonRejection>,
) -> ApiResult<PatientDoctor> {
    let req = json_body(payload, "Invalid request body")?;
    Ok(ApiResponse::created(state.patients().assign(&tenant, req).await?))
}

pub async fn unassign(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let id = parse_id(&id, "Invalid ID")?;
    state.patients().unassign(&tenant, id).await?;
    Ok(ApiResponse::no_content())
}
