// Handlers reach data only through the tenant-scoped client in AppState;
// none of them filter by tenant themselves.
pub mod data;
pub mod find;
pub mod health;

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::state::AppState;

/// Resources outside the tenant registry (e.g. `organizations`) are not
/// confined to one tenant, so only platform operators may reach them.
pub(crate) fn authorize_resource(state: &AppState, user: &AuthUser, resource: &str) -> Result<(), ApiError> {
    if state.client.registry().is_scoped(resource) || user.role.can_override_tenant() {
        return Ok(());
    }
    tracing::warn!(user_id = %user.user_id, resource, "Access to unscoped resource denied");
    Err(ApiError::forbidden(format!("Access to {} is not permitted for this account", resource)))
}
