#![allow(dead_code)]

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use hse_api_rust::auth::{generate_jwt, Claims, Role};
use hse_api_rust::context::{TenantContext, TenantId};
use hse_api_rust::database::{MemoryStore, RecordMap};
use hse_api_rust::services::ORGANIZATIONS;

pub const ORG_A: &str = "org-a";
pub const ORG_B: &str = "org-b";
pub const ORG_CANCELED: &str = "org-canceled";

pub fn record(value: Value) -> RecordMap {
    value.as_object().cloned().unwrap_or_default()
}

pub fn tenant(id: &str) -> TenantContext {
    TenantContext::from_claim(TenantId::new(id).expect("non-empty tenant id"))
}

pub fn tenant_id(id: &str) -> TenantId {
    TenantId::new(id).expect("non-empty tenant id")
}

/// Store seeded with two active organizations and one canceled one
pub async fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store
        .seed(
            ORGANIZATIONS,
            vec![
                organization(ORG_A, "Acme Fuel", "active"),
                organization(ORG_B, "Bravo Petroleum", "trialing"),
                organization(ORG_CANCELED, "Closed Co", "canceled"),
            ],
        )
        .await;
    store
}

fn organization(id: &str, name: &str, status: &str) -> RecordMap {
    record(json!({
        "id": id,
        "name": name,
        "subscription_plan": "professional",
        "subscription_status": status,
        "created_at": "2024-01-01T00:00:00Z"
    }))
}

pub fn token(role: Role, organization_id: Option<&str>) -> Result<String> {
    let claims = Claims::new(
        Uuid::new_v4(),
        "user@example.com".to_string(),
        role,
        organization_id.map(str::to_string),
    );
    generate_jwt(claims).context("failed to sign test token")
}

pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// Drive one request through the router in process
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    headers: &[(&str, &str)],
    body: Option<Value>,
) -> Result<TestResponse> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body)?))?,
        None => builder.body(Body::empty())?,
    };

    send_request(app, request).await
}

pub async fn send_request(app: &Router, request: Request<Body>) -> Result<TestResponse> {
    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).context("response body is not JSON")?
    };
    Ok(TestResponse { status, body })
}
