use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config;
use crate::handlers::{data, find, health};
use crate::middleware::{jwt_auth_middleware, tenant_context_middleware};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let app = Router::new()
        // Public
        .route("/health", get(health::health))
        // Protected API
        .merge(api_routes(state.clone()))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if config::config().security.enable_cors {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}

fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Resource-level operations (collection)
        .route("/api/data/:resource", get(data::list).post(data::create))
        // Record-level operations (individual)
        .route(
            "/api/data/:resource/:id",
            get(data::get).put(data::update).patch(data::update).delete(data::delete),
        )
        // Filtered search
        .route("/api/find/:resource", post(find::find))
        .route("/api/find/:resource/count", post(find::count))
        // Layers run bottom-up: authenticate, then establish the tenant scope
        .layer(from_fn_with_state(state, tenant_context_middleware))
        .layer(from_fn(jwt_auth_middleware))
}
