// handlers/protected/documents.rs - patient documents and clinical images
//
// GET|POST /api/patients/:id/documents, GET|PUT|DELETE /api/patients/:id/documents/:item_id,
// GET|POST /api/patients/:id/images, GET|PUT|DELETE /api/patients/:id/images/:item_id

use axum::extract::{rejection::JsonRejection, Extension, Path, Query, State};
use axum::Json;
use serde_json::Value;
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::{PatientDoc, PatientImage};
use crate::error::ApiError;
use crate::handlers::{json_body, parse_id};
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::document_service::{DocInput, DocPage, ImageInput};
use crate::services::{ListParams, Tenant};

fn ids(patient_id: &str, id: &str) -> Result<(Uuid, Uuid), ApiError> {
    Ok((parse_id(patient_id, "Invalid patient ID")?, parse_id(id, "Invalid ID")?))
}

pub async fn list_docs(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    Path(patient_id): Path<String>,
    Query(params): Query<ListParams>,
) -> ApiResult<DocPage> {
    let patient_id = parse_id(&patient_id, "Invalid patient ID")?;
    Ok(ApiResponse::success(state.documents().list_docs(&tenant, patient_id, &params).await?))
}

pub async fn create_doc(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    Path(patient_id): Path<String>,
    payload: Result<Json<DocInput>, JsonRejection>,
) -> ApiResult<PatientDoc> {
    let patient_id = parse_id(&patient_id, "Invalid patient ID")?;
    let input = json_body(payload, "Invalid request body")?;
    Ok(ApiResponse::created(state.documents().create_doc(&tenant, patient_id, input).await?))
}

pub async fn get_doc(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    Path((patient_id, id)): Path<(String, String)>,
) -> ApiResult<PatientDoc> {
    let (patient_id, id) = ids(&patient_id, &id)?;
    Ok(ApiResponse::success(state.documents().get_doc(&tenant, patient_id, id).await?))
}

pub async fn update_doc(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    Path((patient_id, id)): Path<(String, String)>,
    payload: Result<Json<DocInput>, JsonRejection>,
) -> ApiResult<Value> {
    let (patient_id, id) = ids(&patient_id, &id)?;
    let input = json_body(payload, "Invalid request body")?;
    state.documents().update_doc(&tenant, patient_id, id, input).await?;
    Ok(ApiResponse::message("Patient document updated successfully"))
}

pub async fn delete_doc(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    Path((patient_id, id)): Path<(String, String)>,
) -> ApiResult<()> {
    let (patient_id, id) = ids(&patient_id, &id)?;
    state.documents().delete_doc(&tenant, patient_id, id).await?;
    Ok(ApiResponse::no_content())
}

/// GET /api/patients/:id/images?type=&category=
pub async fn list_images(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    Path(patient_id): Path<String>,
    Query(params): Query<ListParams>,
) -> ApiResult<Vec<PatientImage>> {
    let patient_id = parse_id(&patient_id, "Invalid patient ID")?;
    Ok(ApiResponse::success(state.documents().list_images(&tenant, patient_id, &params).await?))
}

pub async fn create_image(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    Path(patient_id): Path<String>,
    payload: Result<Json<ImageInput>, JsonRejection>,
) -> ApiResult<PatientImage> {
    let patient_id = parse_id(&patient_id, "Invalid patient ID")?;
    let input = json_body(payload, "Invalid request body")?;
    Ok(ApiResponse::created(state.documents().create_image(&tenant, patient_id, input).await?))
}

pub async fn get_image(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    Path((patient_id, id)): Path<(String, String)>,
) -> ApiResult<PatientImage> {
    let (patient_id, id) = ids(&patient_id, &id)?;
    Ok(ApiResponse::success(state.documents().get_image(&tenant, patient_id, id).await?))
}

pub async fn update_image(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    Path((patient_id, id)): Path<(String, String)>,
    payload: Result<Json<ImageInput>, JsonRejection>,
) -> ApiResult<Value> {
    let (patient_id, id) = ids(&patient_id, &id)?;
    let input = json_body(payload, "Invalid request body")?;
    state.documents().update_image(&tenant, patient_id, id, input).await?;
    Ok(ApiResponse::message("Patient image updated successfully"))
}

pub async fn delete_image(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    Path((patient_id, id)): Path<(String, String)>,
) -> ApiResult<()> {
    let (patient_id, id) = ids(&patient_id, &id)?;
    state.documents().delete_image(&tenant, patient_id, id).await?;
    Ok(ApiResponse::no_content())
}
