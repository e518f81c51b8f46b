// handlers/public/billing.rs - payment provider catalogue and callbacks
//
// GET  /api/stripe/prices, /api/stripe/products
// POST /api/stripe/webhook            (signature-checked)
// GET  /api/stripe/checkout-success   (browser redirect target)

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::HeaderMap,
    response::Redirect,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};

pub const SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Debug, Deserialize)]
pub struct CheckoutSuccessQuery {
    pub session_id: Option<String>,
}

pub async fn prices(State(state): State<AppState>) -> ApiResult<Value> {
    let prices = state.billing_service().prices().await?;
    Ok(ApiResponse::success(json!({ "data": prices })))
}

pub async fn products(State(state): State<AppState>) -> ApiResult<Value> {
    let products = state.billing_service().products().await?;
    Ok(ApiResponse::success(json!({ "data": products })))
}

/// POST /api/stripe/webhook - the raw body is needed for signature verification
pub async fn webhook(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> ApiResult<Value> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    state.billing_service().handle_webhook(&body, signature).await?;
    Ok(ApiResponse::success(json!({ "received": true })))
}

/// GET /api/stripe/checkout-success?session_id= - records the subscription, then 303s to the dashboard
pub async fn checkout_success(
    State(state): State<AppState>,
    Query(query): Query<CheckoutSuccessQuery>,
) -> Result<Redirect, ApiError> {
    let target = state
        .billing_service()
        .complete_checkout(query.session_id.as_deref())
        .await?;
    Ok(Redirect::to(&target))
}
