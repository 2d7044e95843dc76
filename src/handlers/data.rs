use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::context;
use crate::database::{DatabaseError, RecordMap};
use crate::error::ApiError;
use crate::filter::FilterData;
use crate::handlers::authorize_resource;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

impl ListQuery {
    fn is_plain(&self) -> bool {
        self.limit.is_none() && self.offset.is_none()
    }
}

/// GET /api/data/:resource - list visible records
///
/// Unpaged lists of tenant-scoped resources are served through the
/// tenant's object cache.
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(resource): Path<String>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<RecordMap>> {
    authorize_resource(&state, &user, &resource)?;
    let filter = FilterData {
        limit: query.limit,
        offset: query.offset,
        ..Default::default()
    };

    let client = &state.client;
    let records = match context::current_tenant() {
        Some(tenant) if query.is_plain() && client.registry().is_scoped(&resource) => {
            let resource = resource.as_str();
            state
                .cache
                .get_or_load_collection(&tenant, resource, None, move || async move {
                    client.find_many(resource, filter).await.map_err(ApiError::from)
                })
                .await?
        }
        _ => client.find_many(&resource, filter).await?,
    };

    Ok(ApiResponse::success(records))
}

/// GET /api/data/:resource/:id - one record, 404 when not visible
pub async fn get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((resource, id)): Path<(String, String)>,
) -> ApiResult<RecordMap> {
    authorize_resource(&state, &user, &resource)?;
    let client = &state.client;
    let (resource, id) = (resource.as_str(), id.as_str());
    let load = move || async move {
        client
            .find_by_id(resource, id)
            .await?
            .ok_or_else(|| ApiError::from(not_found(resource, id)))
    };

    let record = match context::current_tenant() {
        Some(tenant) if client.registry().is_scoped(resource) => {
            state.cache.get_or_load(&tenant, resource, id, None, load).await?
        }
        _ => load().await?,
    };

    Ok(ApiResponse::success(record))
}

/// POST /api/data/:resource - create one record or an array of records
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(resource): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult<Value> {
    authorize_resource(&state, &user, &resource)?;
    match body {
        Value::Object(record) => {
            let created = state.client.create(&resource, record).await?;
            Ok(ApiResponse::created(Value::Object(created)))
        }
        Value::Array(items) => {
            let records = items
                .into_iter()
                .map(|item| match item {
                    Value::Object(record) => Ok(record),
                    _ => Err(ApiError::validation_error("Each record must be a JSON object")),
                })
                .collect::<Result<Vec<_>, _>>()?;
            let created = state.client.create_many(&resource, records).await?;
            Ok(ApiResponse::created(json!(created)))
        }
        _ => Err(ApiError::validation_error("Request body must be an object or an array of objects")),
    }
}

/// PUT/PATCH /api/data/:resource/:id - partial update, 404 when not visible
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((resource, id)): Path<(String, String)>,
    Json(changes): Json<RecordMap>,
) -> ApiResult<RecordMap> {
    authorize_resource(&state, &user, &resource)?;
    let updated = state
        .client
        .update(&resource, &id, changes)
        .await?
        .ok_or_else(|| ApiError::from(not_found(&resource, &id)))?;
    Ok(ApiResponse::success(updated))
}

/// DELETE /api/data/:resource/:id - 404 when not visible
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((resource, id)): Path<(String, String)>,
) -> ApiResult<Value> {
    authorize_resource(&state, &user, &resource)?;
    let deleted = state.client.delete(&resource, &id).await?;
    if deleted == 0 {
        return Err(not_found(&resource, &id).into());
    }
    Ok(ApiResponse::success(json!({ "id": id, "deleted": deleted })))
}

fn not_found(resource: &str, id: &str) -> DatabaseError {
    DatabaseError::NotFound(format!("{} '{}' not found", resource, id))
}
