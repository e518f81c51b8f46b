// handlers/protected/account.rs - identity of the authenticated caller
//
// GET /api/protected, GET /api/auth/me, POST /api/auth/signout, GET /api/doctors/me

use axum::extract::{Extension, State};
use serde_json::{json, Value};
use tracing::info;

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};

pub async fn protected(Extension(_user): Extension<AuthUser>) -> ApiResult<Value> {
    Ok(ApiResponse::success(json!({
        "message": "This is a protected route",
        "authenticated": true,
    })))
}

/// GET /api/auth/me - echoes the token identity with a truncated token
pub async fn me(Extension(user): Extension<AuthUser>) -> ApiResult<Value> {
    Ok(ApiResponse::success(json!({
        "user": user.public_json(),
        "token": user.token_preview(),
    })))
}

/// POST /api/auth/signout - sessions live with the identity provider; nothing to revoke here
pub async fn signout(Extension(user): Extension<AuthUser>) -> ApiResult<()> {
    info!("User {} signed out", user.user_id);
    Ok(ApiResponse::no_content())
}

/// GET /api/doctors/me - lookup only, never provisions
pub async fn doctor_me(State(state): State<AppState>, Extension(user): Extension<AuthUser>) -> ApiResult<Value> {
    let account_id = user.account_id()?;
    let body = match state.tenants().find_doctor(account_id).await? {
        Some(doctor) => json!({ "user": user.public_json(), "doctor": doctor }),
        None => json!({
            "user": user.public_json(),
            "doctor": null,
            "message": "Doctor profile not found",
        }),
    };
    Ok(ApiResponse::success(body))
}
