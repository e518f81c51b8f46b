// handlers/protected/finances.rs - charges, payments and expenses
//
// GET|POST /api/finances, GET|PUT|DELETE /api/finances/:id
// Writes record the caller's address in the activity log.

use std::net::SocketAddr;

use axum::extract::{rejection::JsonRejection, ConnectInfo, Extension, Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde_json::Value;

use crate::app::AppState;
use crate::database::models::Finance;
use crate::handlers::{client_ip, json_body, parse_id};
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::finance_service::{FinanceInput, FinancePage};
use crate::services::{ListParams, Tenant};

pub async fn create(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    payload: Result<Json<FinanceInput>, JsonRejection>,
) -> ApiResult<Finance> {
    let input = json_body(payload, "Invalid request body")?;
    let ip = client_ip(&headers, peer);
    Ok(ApiResponse::created(state.finances().create(&tenant, input, &ip).await?))
}

/// GET /api/finances?search=&status=&start_date=&end_date=&patient_id=&page=&limit=
pub async fn list(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    Query(params): Query<ListParams>,
) -> ApiResult<FinancePage> {
    Ok(ApiResponse::success(state.finances().list(&tenant, &params).await?))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    Path(id): Path<String>,
) -> ApiResult<Finance> {
    let id = parse_id(&id, "Invalid ID")?;
    Ok(ApiResponse::success(state.finances().get(&tenant, id).await?))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    Path(id): Path<String>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    payload: Result<Json<FinanceInput>, JsonRejection>,
) -> ApiResult<Value> {
    let id = parse_id(&id, "Invalid ID")?;
    let input = json_body(payload, "Invalid request body")?;
    let ip = client_ip(&headers, peer);
    state.finances().update(&tenant, id, input, &ip).await?;
    Ok(ApiResponse::message("Finance record updated successfully"))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    Path(id): Path<String>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
) -> ApiResult<()> {
    let id = parse_id(&id, "Invalid ID")?;
    let ip = client_ip(&headers, peer);
    state.finances().delete(&tenant, id, &ip).await?;
    Ok(ApiResponse::no_content())
}
