use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::config;
use crate::context::{with_tenant, without_tenant, TenantContext};
use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::services::TenantError;
use crate::state::AppState;

/// Resolves the acting tenant and runs the rest of the request inside it.
///
/// Must run after `jwt_auth_middleware`. The tenant comes from the token's
/// organization claim, or from the override header when the caller may act
/// across tenants. Unknown and inactive organizations are rejected with 403.
pub async fn tenant_context_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(user) = request.extensions().get::<AuthUser>().cloned() else {
        return ApiError::unauthorized("Authentication required").into_response();
    };

    let header_name = config::config().tenant.override_header.as_str();
    let override_id = match request.headers().get(header_name).map(|value| value.to_str()) {
        None => None,
        Some(Ok(value)) => Some(value.to_string()),
        Some(Err(_)) => {
            tracing::warn!(user_id = %user.user_id, "Malformed {} header rejected", header_name);
            return ApiError::bad_request(format!("Invalid {} header", header_name)).into_response();
        }
    };

    let ctx = match override_id {
        Some(tenant_id) => {
            if !user.role.can_override_tenant() {
                tracing::warn!(user_id = %user.user_id, "Tenant override rejected for role {:?}", user.role);
                return ApiError::forbidden("Tenant override is not permitted for this account").into_response();
            }
            match state.tenants.resolve(&tenant_id).await {
                Ok(id) => {
                    tracing::info!(user_id = %user.user_id, tenant = %id, "Acting under tenant override");
                    TenantContext::from_override(id)
                }
                Err(e) => return ApiError::from(e).into_response(),
            }
        }
        None => match user.organization_id.as_deref() {
            Some(tenant_id) => match state.tenants.resolve(tenant_id).await {
                Ok(id) => TenantContext::from_claim(id),
                Err(e) => return ApiError::from(e).into_response(),
            },
            // Platform operators without an override act with no tenant
            None if user.role.can_override_tenant() => {
                return without_tenant(next.run(request)).await;
            }
            None => return ApiError::from(TenantError::MissingTenantId).into_response(),
        },
    };

    tracing::debug!(tenant = %ctx.tenant_id, source = ?ctx.source, "Tenant context established");
    with_tenant(ctx, next.run(request)).await
}
