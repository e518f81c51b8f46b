// handlers/protected/billing.rs - hosted checkout and customer portal
//
// POST /api/stripe/create-checkout-session, POST /api/stripe/create-portal-session

use axum::extract::{rejection::JsonRejection, Extension, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::handlers::json_body;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::billing_service::CheckoutStarted;

#[derive(Debug, Default, Deserialize)]
pub struct CheckoutBody {
    #[serde(rename = "priceId", default)]
    pub price_id: String,
}

pub async fn create_checkout_session(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<CheckoutBody>, JsonRejection>,
) -> ApiResult<CheckoutStarted> {
    let body = json_body(payload, "Invalid request body")?;
    let account_id = user.account_id()?;
    let started = state.billing_service().checkout(account_id, &body.price_id).await?;
    Ok(ApiResponse::success(started))
}

pub async fn create_portal_session(State(state): State<AppState>, Extension(user): Extension<AuthUser>) -> ApiResult<Value> {
    let account_id = user.account_id()?;
    let url = state.billing_service().portal(account_id).await?;
    Ok(ApiResponse::success(json!({ "url": url })))
}
