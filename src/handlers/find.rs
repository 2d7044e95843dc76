use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Serialize;
use serde_json::Value;

use crate::database::RecordMap;
use crate::filter::FilterData;
use crate::handlers::authorize_resource;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::state::AppState;

/// POST /api/find/:resource - filtered search
///
/// Accepts a FilterData JSON body with:
/// - select: fields to return
/// - where: filter conditions
/// - order: sort order
/// - limit/offset: pagination
pub async fn find(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(resource): Path<String>,
    Json(filter): Json<FilterData>,
) -> ApiResult<Vec<RecordMap>> {
    authorize_resource(&state, &user, &resource)?;
    let records = state.client.find_many(&resource, filter).await?;
    Ok(ApiResponse::success(records))
}

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: u64,
}

/// POST /api/find/:resource/count - number of visible records matching a WHERE object
pub async fn count(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(resource): Path<String>,
    Json(where_clause): Json<Option<Value>>,
) -> ApiResult<CountResponse> {
    authorize_resource(&state, &user, &resource)?;
    let count = state.client.count(&resource, where_clause).await?;
    Ok(ApiResponse::success(CountResponse { count }))
}
