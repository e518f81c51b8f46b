// handlers/protected/search.rs - GET /api/search, /api/search/patients, /api/search/appointments

use axum::extract::{Extension, Query, State};

use crate::app::AppState;
use crate::database::models::{Appointment, Patient};
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::search_service::{SearchParams, SearchResults};
use crate::services::Tenant;

pub async fn global(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    Query(params): Query<SearchParams>,
) -> ApiResult<SearchResults> {
    Ok(ApiResponse::success(state.search().global(&tenant, &params).await?))
}

pub async fn patients(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Vec<Patient>> {
    Ok(ApiResponse::success(state.search().patients(&tenant, &params).await?))
}

pub async fn appointments(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Vec<Appointment>> {
    Ok(ApiResponse::success(state.search().appointments(&tenant, &params).await?))
}
