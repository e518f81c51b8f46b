use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::{Map, Value};
use tracing::warn;

use super::AuthError;

/// Identity asserted by a bearer token's payload
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityClaims {
    pub subject: String,
    pub email: Option<String>,
    /// `user_metadata.role`, then `app_metadata.role`, else empty
    pub role: String,
}

/// Pulls the token out of an `Authorization: Bearer <token>` header value.
/// The value must split on single spaces into exactly `Bearer` and the token.
pub fn extract_bearer(header: Option<&str>) -> Result<&str, AuthError> {
    let header = header.ok_or(AuthError::MissingHeader)?;
    let mut parts = header.split(' ');
    let (scheme, token) = match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) => (scheme, token),
        _ => return Err(AuthError::InvalidHeaderFormat),
    };
    if scheme != "Bearer" {
        return Err(AuthError::InvalidHeaderFormat);
    }
    if token.is_empty() {
        return Err(AuthError::EmptyToken);
    }
    Ok(token)
}

/// Decodes the payload segment of a three-part token without checking its signature
pub fn decode_claims(token: &str) -> Result<IdentityClaims, AuthError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(AuthError::InvalidJwtFormat);
    }

    let bytes = URL_SAFE_NO_PAD.decode(segments[1].trim_end_matches('=')).map_err(|e| {
        warn!("Failed to decode token payload: {}", e);
        AuthError::InvalidToken
    })?;
    let payload: Map<String, Value> = serde_json::from_slice(&bytes).map_err(|e| {
        warn!("Failed to parse token payload: {}", e);
        AuthError::InvalidToken
    })?;

    let subject = payload
        .get("sub")
        .and_then(Value::as_str)
        .ok_or(AuthError::InvalidUserId)?
        .to_string();
    let email = payload.get("email").and_then(Value::as_str).map(str::to_string);
    let role = metadata_role(&payload, "user_metadata")
        .or_else(|| metadata_role(&payload, "app_metadata"))
        .unwrap_or_default();

    Ok(IdentityClaims { subject, email, role })
}

/// Header-to-claims in one step, without signature checks
pub fn decode_bearer(header: Option<&str>) -> Result<IdentityClaims, AuthError> {
    decode_claims(extract_bearer(header)?)
}

fn metadata_role(payload: &Map<String, Value>, section: &str) -> Option<String> {
    payload
        .get(section)?
        .get("role")?
        .as_str()
        .map(str::to_string)
}
