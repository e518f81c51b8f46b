use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use serde_json::{json, Value};
use tracing::warn;

use crate::app::AppState;
use crate::auth::{extract_bearer, AuthError, IdentityClaims};
use crate::error::ApiError;

/// Authenticated caller extracted from the bearer token
#[derive(Clone, Debug)]
pub struct AuthUser {
    /// Token subject; normally the account UUID
    pub user_id: String,
    pub email: String,
    pub role: String,
    pub token: String,
}

impl AuthUser {
    pub fn from_claims(claims: IdentityClaims, token: &str) -> Self {
        Self {
            user_id: claims.subject,
            email: claims.email.unwrap_or_default(),
            role: claims.role,
            token: token.to_string(),
        }
    }

    /// `{id, email, role}` as echoed in `user` response fields
    pub fn public_json(&self) -> Value {
        json!({ "id": self.user_id, "email": self.email, "role": self.role })
    }

    /// Account id as a UUID; 400 "Invalid user ID" otherwise
    pub fn account_id(&self) -> Result<uuid::Uuid, ApiError> {
        uuid::Uuid::parse_str(&self.user_id).map_err(|_| ApiError::bad_request("Invalid user ID"))
    }

    /// Token prefix safe to echo back
    pub fn token_preview(&self) -> String {
        let prefix: String = self.token.chars().take(20).collect();
        format!("{}...", prefix)
    }
}

/// Bearer authentication: verifies the token and injects [`AuthUser`]
pub async fn jwt_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .map(|v| v.to_str().map_err(|_| AuthError::InvalidHeaderFormat))
        .transpose()?;

    let token = extract_bearer(header)?;
    let claims = state.verifier.verify(token).map_err(|e| {
        warn!("Rejected bearer token: {}", e);
        e
    })?;

    let auth_user = AuthUser::from_claims(claims, token);
    request.extensions_mut().insert(auth_user);

    Ok(next.run(request).await)
}
