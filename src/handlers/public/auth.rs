// handlers/public/auth.rs - account entry points
//
// POST /api/login, /api/signup, /api/resend-confirmation, /api/admin/seed

use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    Json,
};

use crate::app::AppState;
use crate::handlers::json_body;
use crate::identity::AuthSession;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::account_service::{LoginRequest, ResendNotice, ResendRequest, SeededAdmin, SignupRequest};

pub const SEED_TOKEN_HEADER: &str = "x-admin-seed-token";

/// POST /api/login - password sign-in through the identity provider
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<AuthSession> {
    let req = json_body(payload, "Invalid request")?;
    Ok(ApiResponse::success(state.accounts().login(req).await?))
}

/// POST /api/signup - creates the account, its doctor profile and a free plan
pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> ApiResult<AuthSession> {
    let req = json_body(payload, "Invalid request")?;
    Ok(ApiResponse::created(state.accounts().signup(req).await?))
}

/// POST /api/resend-confirmation
pub async fn resend_confirmation(
    State(state): State<AppState>,
    payload: Result<Json<ResendRequest>, JsonRejection>,
) -> ApiResult<ResendNotice> {
    let req = json_body(payload, "Invalid request")?;
    Ok(ApiResponse::success(state.accounts().resend_confirmation(req).await?))
}

/// POST /api/admin/seed - guarded by the `X-Admin-Seed-Token` header
pub async fn seed_admin(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> ApiResult<SeededAdmin> {
    let accounts = state.accounts();
    let token = headers.get(SEED_TOKEN_HEADER).and_then(|v| v.to_str().ok());
    accounts.authorize_seed(token)?;

    let req = json_body(payload, "Invalid request")?;
    Ok(ApiResponse::created(accounts.seed_admin(req).await?))
}
