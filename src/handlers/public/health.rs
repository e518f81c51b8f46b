use axum::{extract::State, Json};
use serde_json::{json, Value};
use tracing::warn;

use crate::app::AppState;

/// GET /api/health - liveness plus a record store probe
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let store = match state.store.ping().await {
        Ok(()) => "ok",
        Err(e) => {
            warn!("Health check: {} store unavailable: {}", state.store.backend_name(), e);
            "unavailable"
        }
    };

    Json(json!({
        "status": "ok",
        "auth": "supabase-only",
        "store": store,
    }))
}
