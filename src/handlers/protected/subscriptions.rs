// handlers/protected/subscriptions.rs - the caller's plan rows
//
// POST /api/subscriptions, GET /api/subscriptions/me, GET|PUT /api/subscriptions/:id

use axum::extract::{rejection::JsonRejection, Extension, Path, State};
use axum::Json;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::Subscription;
use crate::error::ApiError;
use crate::handlers::{json_body, parse_id};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::subscription_service::{SubscriptionInput, SubscriptionPatch};

async fn caller_doctor(state: &AppState, user: &AuthUser) -> Result<Uuid, ApiError> {
    let account_id = user.account_id()?;
    state
        .tenants()
        .find_doctor(account_id)
        .await?
        .map(|doctor| doctor.id)
        .ok_or_else(|| ApiError::bad_request("Doctor profile not found"))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<SubscriptionInput>, JsonRejection>,
) -> ApiResult<Subscription> {
    let input = json_body(payload, "Invalid request body")?;
    let doctor_id = caller_doctor(&state, &user).await?;
    let subscription = state.subscriptions().create(doctor_id, input).await?;
    Ok(ApiResponse::created(subscription))
}

/// GET /api/subscriptions/me - latest subscription, or `null` with a message
pub async fn me(State(state): State<AppState>, Extension(user): Extension<AuthUser>) -> ApiResult<Value> {
    let account_id = user.account_id()?;
    let subscription = match state.tenants().find_doctor(account_id).await? {
        Some(doctor) => state.subscriptions().for_doctor(doctor.id).await?,
        None => None,
    };

    let body = match subscription {
        Some(subscription) => json!({ "user": user.public_json(), "subscription": subscription }),
        None => json!({
            "user": user.public_json(),
            "subscription": null,
            "message": "No active subscription found",
        }),
    };
    Ok(ApiResponse::success(body))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<Subscription> {
    let id = parse_id(&id, "Invalid ID")?;
    let doctor_id = caller_doctor(&state, &user).await?;
    Ok(ApiResponse::success(state.subscriptions().get(doctor_id, id).await?))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    payload: Result<Json<SubscriptionPatch>, JsonRejection>,
) -> ApiResult<Subscription> {
    let id = parse_id(&id, "Invalid ID")?;
    let patch = json_body(payload, "Invalid request body")?;
    let doctor_id = caller_doctor(&state, &user).await?;
    Ok(ApiResponse::success(state.subscriptions().update(doctor_id, id, patch).await?))
}
