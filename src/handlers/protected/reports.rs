// handlers/protected/reports.rs - aggregates over the tenant's records
//
// GET /api/reports/dashboard-stats, /financial?period=, /appointments?period=,
// /daily-appointments?date=

use axum::extract::{Extension, Query, State};

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::appointment_service::AppointmentRow;
use crate::services::report_service::{AppointmentReport, DashboardStats, FinancialReport, Period, ReportParams};
use crate::services::Tenant;

pub async fn dashboard_stats(State(state): State<AppState>, Extension(tenant): Extension<Tenant>) -> ApiResult<DashboardStats> {
    Ok(ApiResponse::success(state.reports().dashboard_stats(&tenant).await?))
}

pub async fn financial(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    Query(params): Query<ReportParams>,
) -> ApiResult<FinancialReport> {
    let period = Period::parse(params.period.as_deref())?;
    Ok(ApiResponse::success(state.reports().financial(&tenant, period).await?))
}

pub async fn appointments(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    Query(params): Query<ReportParams>,
) -> ApiResult<AppointmentReport> {
    let period = Period::parse(params.period.as_deref())?;
    Ok(ApiResponse::success(state.reports().appointments(&tenant, period).await?))
}

pub async fn daily_appointments(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    Query(params): Query<ReportParams>,
) -> ApiResult<Vec<AppointmentRow>> {
    Ok(ApiResponse::success(state.reports().daily(&tenant, &params).await?))
}
