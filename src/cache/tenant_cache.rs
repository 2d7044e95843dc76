//! Tenant-namespaced object cache.
//!
//! Every read and write goes through [`CacheKey`], so a lookup for tenant A
//! can only ever address keys inside tenant A's namespace. Backend failures
//! never reach the caller: reads degrade to a miss and writes to a no-op,
//! each with a `warn!` log.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::backend::CacheBackend;
use super::key::CacheKey;
use super::memory::MemoryCacheBackend;
use crate::context::TenantId;

#[derive(Clone)]
pub struct TenantCache {
    backend: Option<Arc<dyn CacheBackend>>,
    default_ttl: Duration,
}

impl TenantCache {
    pub fn new(backend: Arc<dyn CacheBackend>, default_ttl: Duration) -> Self {
        Self {
            backend: Some(backend),
            default_ttl,
        }
    }

    /// In-process cache sized from configuration.
    pub fn in_memory() -> Self {
        let cache = &crate::config::config().cache;
        Self::new(
            Arc::new(MemoryCacheBackend::new(cache.max_entries)),
            Duration::from_secs(cache.default_ttl_secs),
        )
    }

    /// Always misses; writes are dropped.
    pub fn disabled() -> Self {
        Self {
            backend: None,
            default_ttl: Duration::ZERO,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    pub async fn get<T: DeserializeOwned>(&self, tenant_id: &TenantId, resource_type: &str, resource_id: &str) -> Option<T> {
        self.get_key(&CacheKey::build(tenant_id, resource_type, resource_id)).await
    }

    pub async fn set<T: Serialize>(
        &self,
        tenant_id: &TenantId,
        resource_type: &str,
        resource_id: &str,
        value: &T,
        ttl: Option<Duration>,
    ) {
        let key = CacheKey::build(tenant_id, resource_type, resource_id);
        self.set_key(&key, value, ttl.unwrap_or(self.default_ttl)).await;
    }

    pub async fn mget<T: DeserializeOwned>(
        &self,
        tenant_id: &TenantId,
        resource_type: &str,
        resource_ids: &[String],
    ) -> Vec<Option<T>> {
        let Some(backend) = &self.backend else {
            return resource_ids.iter().map(|_| None).collect();
        };
        let keys: Vec<String> = resource_ids
            .iter()
            .map(|id| CacheKey::build(tenant_id, resource_type, id))
            .collect();
        match backend.mget(&keys).await {
            Ok(raw) => raw
                .into_iter()
                .zip(&keys)
                .map(|(value, key)| value.and_then(|v| decode(key, &v)))
                .collect(),
            Err(e) => {
                warn!(backend = backend.name(), error = %e, "Cache mget failed, treating as miss");
                resource_ids.iter().map(|_| None).collect()
            }
        }
    }

    pub async fn mset<T: Serialize>(
        &self,
        tenant_id: &TenantId,
        resource_type: &str,
        entries: &[(String, T)],
        ttl: Option<Duration>,
    ) {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let writes = entries.iter().map(|(id, value)| {
            let key = CacheKey::build(tenant_id, resource_type, id);
            async move { self.set_key(&key, value, ttl).await }
        });
        join_all(writes).await;
    }

    /// Drops one tenant's entries: all of them, or only one resource type's.
    /// Other tenants' namespaces are never touched.
    pub async fn invalidate(&self, tenant_id: &TenantId, resource_type: Option<&str>) -> u64 {
        let prefix = match resource_type {
            Some(resource_type) => CacheKey::resource_namespace(tenant_id, resource_type),
            None => CacheKey::tenant_namespace(tenant_id),
        };
        let removed = self.delete_prefix(&prefix).await;
        debug!(tenant = %tenant_id, resource = ?resource_type, removed, "Invalidated tenant cache namespace");
        removed
    }

    /// Administrative flush of every tenant's object-cache entries.
    pub async fn flush_all(&self) -> u64 {
        let removed = self.delete_prefix(CacheKey::object_prefix()).await;
        warn!(removed, "Flushed object cache for all tenants");
        removed
    }

    /// List entry of one resource type, kept apart from record entries.
    pub async fn get_collection<T: DeserializeOwned>(&self, tenant_id: &TenantId, resource_type: &str) -> Option<T> {
        self.get_key(&CacheKey::collection(tenant_id, resource_type)).await
    }

    pub async fn set_collection<T: Serialize>(
        &self,
        tenant_id: &TenantId,
        resource_type: &str,
        value: &T,
        ttl: Option<Duration>,
    ) {
        let key = CacheKey::collection(tenant_id, resource_type);
        self.set_key(&key, value, ttl.unwrap_or(self.default_ttl)).await;
    }

    /// Read-through: returns the cached value or runs `loader` and caches
    /// its successful result. Loader errors are returned and not cached.
    pub async fn get_or_load<T, E, F, Fut>(
        &self,
        tenant_id: &TenantId,
        resource_type: &str,
        resource_id: &str,
        ttl: Option<Duration>,
        loader: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = CacheKey::build(tenant_id, resource_type, resource_id);
        self.load_through(&key, ttl, loader).await
    }

    /// Read-through for a resource type's list entry.
    pub async fn get_or_load_collection<T, E, F, Fut>(
        &self,
        tenant_id: &TenantId,
        resource_type: &str,
        ttl: Option<Duration>,
        loader: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = CacheKey::collection(tenant_id, resource_type);
        self.load_through(&key, ttl, loader).await
    }

    async fn load_through<T, E, F, Fut>(&self, key: &str, ttl: Option<Duration>, loader: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(hit) = self.get_key(key).await {
            debug!("Cache hit for {}", key);
            return Ok(hit);
        }
        let value = loader().await?;
        self.set_key(key, &value, ttl.unwrap_or(self.default_ttl)).await;
        Ok(value)
    }

    async fn get_key<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let backend = self.backend.as_ref()?;
        match backend.get(key).await {
            Ok(raw) => raw.and_then(|v| decode(key, &v)),
            Err(e) => {
                warn!(backend = backend.name(), error = %e, "Cache get failed, treating as miss");
                None
            }
        }
    }

    async fn set_key<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let Some(backend) = &self.backend else { return };
        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Cache value not serializable, skipping write");
                return;
            }
        };
        if let Err(e) = backend.set(key, payload, ttl).await {
            warn!(backend = backend.name(), error = %e, "Cache set failed, skipping write");
        }
    }

    async fn delete_prefix(&self, prefix: &str) -> u64 {
        let Some(backend) = &self.backend else { return 0 };
        match backend.delete_prefix(prefix).await {
            Ok(removed) => removed,
            Err(e) => {
                warn!(backend = backend.name(), error = %e, "Cache invalidation failed");
                0
            }
        }
    }
}

fn decode<T: DeserializeOwned>(key: &str, raw: &str) -> Option<T> {
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(error = %e, "Undecodable cache entry {}, treating as miss", key);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::error::{CacheError, CacheResult};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn tenant(id: &str) -> TenantId {
        TenantId::new(id).unwrap()
    }

    fn cache() -> TenantCache {
        TenantCache::new(Arc::new(MemoryCacheBackend::new(1024)), Duration::from_secs(60))
    }

    struct FailingBackend;

    #[async_trait]
    impl CacheBackend for FailingBackend {
        fn name(&self) -> &'static str {
            "failing"
        }
        async fn get(&self, _key: &str) -> CacheResult<Option<String>> {
            Err(CacheError::Unavailable("down".into()))
        }
        async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> CacheResult<()> {
            Err(CacheError::Unavailable("down".into()))
        }
        async fn delete(&self, _key: &str) -> CacheResult<bool> {
            Err(CacheError::Unavailable("down".into()))
        }
        async fn delete_prefix(&self, _prefix: &str) -> CacheResult<u64> {
            Err(CacheError::Unavailable("down".into()))
        }
    }

    #[tokio::test]
    async fn test_same_resource_id_is_isolated_per_tenant() {
        let cache = cache();
        cache.set(&tenant("org-a"), "stations", "s1", &json!({"name": "Alpha"}), None).await;

        let hit: Option<Value> = cache.get(&tenant("org-a"), "stations", "s1").await;
        let other: Option<Value> = cache.get(&tenant("org-b"), "stations", "s1").await;
        assert_eq!(hit, Some(json!({"name": "Alpha"})));
        assert_eq!(other, None);
    }

    #[tokio::test]
    async fn test_invalidate_is_scoped_to_one_tenant() {
        let cache = cache();
        cache.set_collection(&tenant("org-a"), "stations", &json!(["a"]), None).await;
        cache.set(&tenant("org-a"), "audits", "x", &json!(1), None).await;
        cache.set_collection(&tenant("org-b"), "stations", &json!(["b"]), None).await;

        assert_eq!(cache.invalidate(&tenant("org-a"), Some("stations")).await, 1);
        assert!(cache.get::<Value>(&tenant("org-a"), "audits", "x").await.is_some());

        cache.invalidate(&tenant("org-a"), None).await;
        assert!(cache.get::<Value>(&tenant("org-a"), "audits", "x").await.is_none());
        assert_eq!(cache.get_collection::<Value>(&tenant("org-b"), "stations").await, Some(json!(["b"])));
    }

    #[tokio::test]
    async fn test_record_named_all_does_not_share_the_list_entry() {
        let cache = cache();
        let t = tenant("org-a");
        cache.set_collection(&t, "stations", &json!([{"id": "s1"}, {"id": "s2"}]), None).await;
        assert_eq!(cache.get::<Value>(&t, "stations", "all").await, None);

        cache.set(&t, "stations", "all", &json!({"id": "all"}), None).await;
        assert_eq!(
            cache.get_collection::<Value>(&t, "stations").await,
            Some(json!([{"id": "s1"}, {"id": "s2"}]))
        );
    }

    #[tokio::test]
    async fn test_mset_and_mget_preserve_order() {
        let cache = cache();
        let t = tenant("org-a");
        cache
            .mset(&t, "incidents", &[("i1".to_string(), json!(1)), ("i3".to_string(), json!(3))], None)
            .await;
        let ids = vec!["i1".to_string(), "i2".to_string(), "i3".to_string()];
        let values: Vec<Option<Value>> = cache.mget(&t, "incidents", &ids).await;
        assert_eq!(values, vec![Some(json!(1)), None, Some(json!(3))]);
    }

    #[tokio::test]
    async fn test_get_or_load_runs_loader_once() {
        let cache = cache();
        let calls = AtomicUsize::new(0);
        for _ in 0..3 {
            let value: Result<Value, ()> = cache
                .get_or_load(&tenant("org-a"), "reports", "r1", None, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(json!({"id": "r1"}))
                })
                .await;
            assert_eq!(value.unwrap(), json!({"id": "r1"}));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_wrongly_typed_entry_is_a_miss() {
        let cache = cache();
        cache.set(&tenant("org-a"), "stations", "s1", &json!("text"), None).await;
        let typed: Option<Vec<u32>> = cache.get(&tenant("org-a"), "stations", "s1").await;
        assert!(typed.is_none());
    }

    #[tokio::test]
    async fn test_failing_backend_degrades_to_miss() {
        let cache = TenantCache::new(Arc::new(FailingBackend), Duration::from_secs(60));
        cache.set(&tenant("org-a"), "stations", "s1", &json!(1), None).await;
        assert!(cache.get::<Value>(&tenant("org-a"), "stations", "s1").await.is_none());
        assert_eq!(cache.invalidate(&tenant("org-a"), None).await, 0);

        let loaded: Result<Value, ()> = cache
            .get_or_load(&tenant("org-a"), "stations", "s1", None, || async { Ok(json!(2)) })
            .await;
        assert_eq!(loaded.unwrap(), json!(2));
    }

    #[tokio::test]
    async fn test_disabled_cache_always_misses() {
        let cache = TenantCache::disabled();
        cache.set(&tenant("org-a"), "stations", "s1", &json!(1), None).await;
        assert!(cache.get::<Value>(&tenant("org-a"), "stations", "s1").await.is_none());
    }

    #[tokio::test]
    async fn test_flush_all_clears_every_tenant() {
        let cache = cache();
        cache.set(&tenant("org-a"), "stations", "s1", &json!(1), None).await;
        cache.set(&tenant("org-b"), "stations", "s1", &json!(2), None).await;
        assert_eq!(cache.flush_all().await, 2);
    }
}
