use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::services::TenantService;

/// Resolves the caller's doctor and injects [`crate::services::Tenant`].
/// Must run after [`super::jwt_auth_middleware`].
pub async fn resolve_tenant_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or_else(|| ApiError::unauthorized("Missing authorization header"))?;

    let tenant = TenantService::new(state.store.clone()).resolve(&user.user_id).await?;
    debug!("Request from {} scoped to doctor {}", user.user_id, tenant.doctor_id);
    request.extensions_mut().insert(tenant);

    Ok(next.run(request).await)
}
