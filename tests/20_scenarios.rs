mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};

use common::{record, seeded_store, tenant, tenant_id, ORG_A, ORG_B};
use hse_api_rust::cache::{MemoryCacheBackend, TenantCache};
use hse_api_rust::context::{with_tenant, without_tenant, TenantId};
use hse_api_rust::database::{DatabaseError, ScopeError, ScopedClient};
use hse_api_rust::filter::FilterData;
use hse_api_rust::services::{
    Organization, OrganizationSource, StoreOrganizationSource, SubscriptionPlan, SubscriptionStatus, TenantService,
    ORGANIZATIONS,
};

#[tokio::test]
async fn station_created_by_one_tenant_is_invisible_to_another() -> Result<()> {
    let store = seeded_store().await;
    let client = ScopedClient::new(store);

    let alpha = with_tenant(tenant(ORG_A), client.create("stations", record(json!({"name": "Alpha"})))).await?;
    assert_eq!(alpha["organization_id"], json!(ORG_A));
    let alpha_id = alpha["id"].as_str().expect("generated id").to_string();

    let seen_by_b = with_tenant(tenant(ORG_B), client.find_many("stations", FilterData::default())).await?;
    assert!(seen_by_b.iter().all(|r| r["name"] != json!("Alpha")));

    let deleted = with_tenant(tenant(ORG_B), client.delete("stations", &alpha_id)).await?;
    assert_eq!(deleted, 0);

    let still_there = with_tenant(tenant(ORG_A), client.find_by_id("stations", &alpha_id)).await?;
    assert_eq!(still_there.map(|r| r["name"].clone()), Some(json!("Alpha")));
    Ok(())
}

#[tokio::test]
async fn contractor_without_context_is_not_created() -> Result<()> {
    let store = seeded_store().await;
    let client = ScopedClient::new(store.clone());

    let result = without_tenant(client.create("contractors", record(json!({"name": "X"})))).await;
    assert!(matches!(result, Err(ScopeError::MissingTenantContext { .. })));
    assert!(store.dump("contractors").await.is_empty());
    Ok(())
}

#[tokio::test]
async fn invalidating_one_tenant_leaves_the_other_cached() -> Result<()> {
    let cache = TenantCache::new(Arc::new(MemoryCacheBackend::new(100)), Duration::from_secs(60));
    let (a, b) = (tenant_id(ORG_A), tenant_id(ORG_B));

    cache.set_collection(&a, "stations", &vec!["Alpha"], None).await;
    cache.set_collection(&b, "stations", &vec!["Bravo"], None).await;

    cache.invalidate(&a, None).await;

    let a_hit: Option<Vec<String>> = cache.get_collection(&a, "stations").await;
    let b_hit: Option<Vec<String>> = cache.get_collection(&b, "stations").await;
    assert!(a_hit.is_none());
    assert_eq!(b_hit, Some(vec!["Bravo".to_string()]));
    Ok(())
}

#[tokio::test]
async fn cached_value_is_never_served_to_another_tenant() -> Result<()> {
    let cache = TenantCache::in_memory();
    cache.set(&tenant_id(ORG_A), "incidents", "i-1", &json!({"severity": "high"}), None).await;

    let foreign: Option<Value> = cache.get(&tenant_id(ORG_B), "incidents", "i-1").await;
    assert!(foreign.is_none());
    Ok(())
}

#[tokio::test]
async fn writes_invalidate_the_writers_cached_lists() -> Result<()> {
    let store = seeded_store().await;
    let cache = TenantCache::new(Arc::new(MemoryCacheBackend::new(100)), Duration::from_secs(60));
    let client = ScopedClient::builder(store).cache(cache.clone()).build();
    let (a, b) = (tenant_id(ORG_A), tenant_id(ORG_B));

    cache.set_collection(&a, "stations", &Vec::<Value>::new(), None).await;
    cache.set_collection(&b, "stations", &Vec::<Value>::new(), None).await;

    with_tenant(tenant(ORG_A), client.create("stations", record(json!({"name": "Alpha"})))).await?;

    let a_hit: Option<Vec<Value>> = cache.get_collection(&a, "stations").await;
    let b_hit: Option<Vec<Value>> = cache.get_collection(&b, "stations").await;
    assert!(a_hit.is_none());
    assert!(b_hit.is_some());
    Ok(())
}

struct CountingSource {
    status: std::sync::Mutex<SubscriptionStatus>,
    calls: AtomicUsize,
}

#[async_trait]
impl OrganizationSource for CountingSource {
    async fn find_organization(&self, id: &TenantId) -> Result<Option<Organization>, DatabaseError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let status = *self.status.lock().expect("status lock");
        Ok(Some(Organization {
            id: id.to_string(),
            name: "Acme Fuel".to_string(),
            subscription_plan: SubscriptionPlan::Starter,
            subscription_status: status,
            created_at: None,
            updated_at: None,
        }))
    }
}

#[tokio::test]
async fn invalidation_forces_a_fresh_validation() -> Result<()> {
    let source = Arc::new(CountingSource {
        status: std::sync::Mutex::new(SubscriptionStatus::Active),
        calls: AtomicUsize::new(0),
    });
    let tenants = TenantService::new(source.clone(), Arc::new(MemoryCacheBackend::new(100)), Duration::from_secs(600));

    assert!(tenants.validate(ORG_A).await);
    assert!(tenants.validate(ORG_A).await);
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);

    *source.status.lock().expect("status lock") = SubscriptionStatus::Canceled;
    assert!(tenants.validate(ORG_A).await, "memoized within TTL");

    tenants.invalidate(ORG_A).await;
    assert!(!tenants.validate(ORG_A).await);
    assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    Ok(())
}

#[tokio::test]
async fn organization_updates_refresh_validation() -> Result<()> {
    let store = seeded_store().await;
    let backend = Arc::new(MemoryCacheBackend::new(100));
    let tenants = Arc::new(TenantService::new(
        Arc::new(StoreOrganizationSource::new(store.clone())),
        backend,
        Duration::from_secs(600),
    ));
    let client = ScopedClient::builder(store).tenants(tenants.clone()).build();

    assert!(tenants.validate(ORG_A).await);

    let changed = client
        .update_many(
            ORGANIZATIONS,
            Some(json!({"id": ORG_A})),
            record(json!({"subscription_status": "canceled"})),
        )
        .await?;
    assert_eq!(changed, 1);
    assert!(!tenants.validate(ORG_A).await);
    Ok(())
}
