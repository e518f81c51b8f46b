// handlers/protected/odontogram.rs - treatments and per-tooth states
//
// GET|POST /api/patients/:id/treatments, GET|PUT|DELETE /api/treatments/:id,
// GET|POST /api/patients/:id/tooth-states, GET|PUT|DELETE /api/patients/:id/tooth-states/:item_id,
// POST /api/patients/:id/tooth-states/odontogram (bulk replace)

use axum::extract::{rejection::JsonRejection, Extension, Path, Query, State};
use axum::Json;
use serde_json::Value;

use crate::app::AppState;
use crate::database::models::{OdontogramTreatment, ToothState};
use crate::handlers::{json_body, parse_id};
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::odontogram_service::{ToothStateInput, TreatmentInput, TreatmentPage};
use crate::services::{ListParams, Tenant};

pub async fn list_treatments(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    Path(patient_id): Path<String>,
    Query(params): Query<ListParams>,
) -> ApiResult<TreatmentPage> {
    let patient_id = parse_id(&patient_id, "Invalid patient ID")?;
    Ok(ApiResponse::success(
        state.odontogram().list_treatments(&tenant, patient_id, &params).await?,
    ))
}

pub async fn create_treatment(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    Path(patient_id): Path<String>,
    payload: Result<Json<TreatmentInput>, JsonRejection>,
) -> ApiResult<OdontogramTreatment> {
    let patient_id = parse_id(&patient_id, "Invalid patient ID")?;
    let input = json_body(payload, "Invalid request body")?;
    Ok(ApiResponse::created(
        state.odontogram().create_treatment(&tenant, patient_id, input).await?,
    ))
}

pub async fn get_treatment(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    Path(id): Path<String>,
) -> ApiResult<OdontogramTreatment> {
    let id = parse_id(&id, "Invalid ID")?;
    Ok(ApiResponse::success(state.odontogram().get_treatment(&tenant, id).await?))
}

pub async fn update_treatment(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    Path(id): Path<String>,
    payload: Result<Json<TreatmentInput>, JsonRejection>,
) -> ApiResult<Value> {
    let id = parse_id(&id, "Invalid ID")?;
    let input = json_body(payload, "Invalid request body")?;
    state.odontogram().update_treatment(&tenant, id, input).await?;
    Ok(ApiResponse::message("Odontogram treatment updated successfully"))
}

pub async fn delete_treatment(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let id = parse_id(&id, "Invalid ID")?;
    state.odontogram().delete_treatment(&tenant, id).await?;
    Ok(ApiResponse::no_content())
}

pub async fn list_tooth_states(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    Path(patient_id): Path<String>,
) -> ApiResult<Vec<ToothState>> {
    let patient_id = parse_id(&patient_id, "Invalid patient ID")?;
    Ok(ApiResponse::success(
        state.odontogram().list_tooth_states(&tenant, patient_id).await?,
    ))
}

pub async fn create_tooth_state(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    Path(patient_id): Path<String>,
    payload: Result<Json<ToothStateInput>, JsonRejection>,
) -> ApiResult<ToothState> {
    let patient_id = parse_id(&patient_id, "Invalid patient ID")?;
    let input = json_body(payload, "Invalid request body")?;
    Ok(ApiResponse::created(
        state.odontogram().create_tooth_state(&tenant, patient_id, input).await?,
    ))
}

pub async fn get_tooth_state(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    Path((patient_id, id)): Path<(String, String)>,
) -> ApiResult<ToothState> {
    let patient_id = parse_id(&patient_id, "Invalid patient ID")?;
    let id = parse_id(&id, "Invalid ID")?;
    Ok(ApiResponse::success(
        state.odontogram().get_tooth_state(&tenant, patient_id, id).await?,
    ))
}

pub async fn update_tooth_state(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    Path((patient_id, id)): Path<(String, String)>,
    payload: Result<Json<ToothStateInput>, JsonRejection>,
) -> ApiResult<Value> {
    let patient_id = parse_id(&patient_id, "Invalid patient ID")?;
    let id = parse_id(&id, "Invalid ID")?;
    let input = json_body(payload, "Invalid request body")?;
    state.odontogram().update_tooth_state(&tenant, patient_id, id, input).await?;
    Ok(ApiResponse::message("Tooth state updated successfully"))
}

pub async fn delete_tooth_state(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    Path((patient_id, id)): Path<(String, String)>,
) -> ApiResult<()> {
    let patient_id = parse_id(&patient_id, "Invalid patient ID")?;
    let id = parse_id(&id, "Invalid ID")?;
    state.odontogram().delete_tooth_state(&tenant, patient_id, id).await?;
    Ok(ApiResponse::no_content())
}

/// POST /api/patients/:id/tooth-states/odontogram - body is the complete new set
pub async fn replace_odontogram(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    Path(patient_id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Vec<ToothState>> {
    let patient_id = parse_id(&patient_id, "Invalid patient ID")?;
    let body = json_body(payload, "Invalid request body")?;
    Ok(ApiResponse::success(
        state.odontogram().replace_odontogram(&tenant, patient_id, body).await?,
    ))
}
