// handlers/mod.rs - two-tier handler layout
//
// Public (no auth) → Protected (bearer auth, most routes also tenant-scoped).
// Handlers stay thin: extract, call a service, shape the response.

pub mod protected;
pub mod public;

use std::net::SocketAddr;

use axum::{
    extract::{rejection::JsonRejection, ConnectInfo},
    http::HeaderMap,
    Json,
};
use serde::de::DeserializeOwned;
use tracing::debug;
use uuid::Uuid;

use crate::error::ApiError;

/// Parses a path or body id, answering 400 with `message` when it is not a UUID
pub fn parse_id(raw: &str, message: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::bad_request(message))
}

/// Unwraps a JSON body, replacing axum's rejection text with `message`
pub fn json_body<T>(payload: Result<Json<T>, JsonRejection>, message: &str) -> Result<T, ApiError> {
    match payload {
        Ok(Json(body)) => Ok(body),
        Err(rejection) => {
            debug!("Rejected request body: {}", rejection.body_text());
            Err(ApiError::bad_request(message))
        }
    }
}

/// Decodes an optional body; an empty or malformed body yields the default
pub fn optional_body<T: DeserializeOwned + Default>(bytes: &[u8]) -> T {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return T::default();
    }
    serde_json::from_slice(bytes).unwrap_or_else(|e| {
        debug!("Ignoring unreadable optional body: {}", e);
        T::default()
    })
}

/// Caller address for activity logs: first `X-Forwarded-For` hop, `X-Real-IP`, then the socket peer
pub fn client_ip(headers: &HeaderMap, peer: Option<ConnectInfo<SocketAddr>>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    match forwarded.or(real_ip) {
        Some(ip) => ip.to_string(),
        None => peer.map(|ConnectInfo(addr)| addr.ip().to_string()).unwrap_or_default(),
    }
}
