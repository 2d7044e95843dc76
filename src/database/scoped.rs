//! Tenant-scoped data access.
//!
//! `ScopedClient` is the only handle business code uses to reach the store.
//! Every call builds an [`ObserverContext`] that captures the active tenant
//! from the request scope and runs it through the observer pipeline, where
//! the security ring confines it to that tenant.

use std::sync::Arc;

use serde_json::{json, Value};
use thiserror::Error;

use super::manager::DatabaseError;
use super::registry::ResourceRegistry;
use super::store::{DataStore, RecordMap};
use crate::cache::TenantCache;
use crate::filter::FilterData;
use crate::observer::{
    CacheInvalidationObserver, FilterValidationObserver, ObserverContext, ObserverError, ObserverPipeline,
    OrganizationInvalidationObserver, QueryOutcome, StoreExecutor, TenantScopeObserver,
};
use crate::services::TenantService;

#[derive(Debug, Error)]
pub enum ScopeError {
    #[error("Tenant context required to write {resource}")]
    MissingTenantContext { resource: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<ObserverError> for ScopeError {
    fn from(error: ObserverError) -> Self {
        match error {
            ObserverError::MissingTenantContext { resource } => ScopeError::MissingTenantContext { resource },
            ObserverError::ValidationError(message) => ScopeError::Validation(message),
            ObserverError::TimeoutError(message) => ScopeError::Timeout(message),
            ObserverError::Database(e) => ScopeError::Database(e),
        }
    }
}

pub struct ScopedClientBuilder {
    store: Arc<dyn DataStore>,
    registry: ResourceRegistry,
    cache: Option<TenantCache>,
    tenants: Option<Arc<TenantService>>,
}

impl ScopedClientBuilder {
    pub fn registry(mut self, registry: ResourceRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Invalidate the writing tenant's cached reads after every write
    pub fn cache(mut self, cache: TenantCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Invalidate tenant validation results after writes to organizations
    pub fn tenants(mut self, tenants: Arc<TenantService>) -> Self {
        self.tenants = Some(tenants);
        self
    }

    pub fn build(self) -> ScopedClient {
        let registry = Arc::new(self.registry);
        let mut pipeline = ObserverPipeline::new();
        pipeline.register(Box::new(FilterValidationObserver));
        pipeline.register(Box::new(TenantScopeObserver::new(registry.clone())));
        pipeline.register(Box::new(StoreExecutor::new(self.store)));
        if let Some(cache) = self.cache {
            pipeline.register(Box::new(CacheInvalidationObserver::new(cache)));
        }
        if let Some(tenants) = self.tenants {
            pipeline.register(Box::new(OrganizationInvalidationObserver::new(tenants)));
        }
        ScopedClient {
            pipeline: Arc::new(pipeline),
            registry,
        }
    }
}

#[derive(Clone)]
pub struct ScopedClient {
    pipeline: Arc<ObserverPipeline>,
    registry: Arc<ResourceRegistry>,
}

impl ScopedClient {
    pub fn builder(store: Arc<dyn DataStore>) -> ScopedClientBuilder {
        ScopedClientBuilder {
            store,
            registry: ResourceRegistry::with_defaults(),
            cache: None,
            tenants: None,
        }
    }

    /// Default registry, no cache hooks
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self::builder(store).build()
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    pub async fn find_many(&self, resource: &str, filter: FilterData) -> Result<Vec<RecordMap>, ScopeError> {
        let ctx = self.pipeline.execute(ObserverContext::select(resource, filter)).await?;
        Ok(rows(ctx.outcome))
    }

    pub async fn find_first(&self, resource: &str, filter: FilterData) -> Result<Option<RecordMap>, ScopeError> {
        let filter = FilterData { limit: Some(1), ..filter };
        Ok(self.find_many(resource, filter).await?.into_iter().next())
    }

    pub async fn find_by_id(&self, resource: &str, id: &str) -> Result<Option<RecordMap>, ScopeError> {
        self.find_first(resource, FilterData::with_where(json!({ "id": id }))).await
    }

    pub async fn count(&self, resource: &str, where_clause: Option<Value>) -> Result<u64, ScopeError> {
        let ctx = self.pipeline.execute(ObserverContext::count(resource, where_clause)).await?;
        Ok(number(ctx.outcome))
    }

    pub async fn create(&self, resource: &str, record: RecordMap) -> Result<RecordMap, ScopeError> {
        self.create_many(resource, vec![record])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DatabaseError::QueryError(format!("Insert into {} returned no row", resource)).into())
    }

    pub async fn create_many(&self, resource: &str, records: Vec<RecordMap>) -> Result<Vec<RecordMap>, ScopeError> {
        let ctx = self.pipeline.execute(ObserverContext::create(resource, records)).await?;
        Ok(rows(ctx.outcome))
    }

    /// Returns the number of rows changed; rows of other tenants never match.
    pub async fn update_many(
        &self,
        resource: &str,
        where_clause: Option<Value>,
        changes: RecordMap,
    ) -> Result<u64, ScopeError> {
        let ctx = self.pipeline.execute(ObserverContext::update(resource, where_clause, changes)).await?;
        Ok(number(ctx.outcome))
    }

    /// Updates one row by id and returns it, or `None` when no visible row matched.
    pub async fn update(&self, resource: &str, id: &str, changes: RecordMap) -> Result<Option<RecordMap>, ScopeError> {
        let affected = self.update_many(resource, Some(json!({ "id": id })), changes).await?;
        if affected == 0 {
            return Ok(None);
        }
        self.find_by_id(resource, id).await
    }

    /// Returns the number of rows deleted; rows of other tenants never match.
    pub async fn delete_many(&self, resource: &str, where_clause: Option<Value>) -> Result<u64, ScopeError> {
        let ctx = self.pipeline.execute(ObserverContext::delete(resource, where_clause)).await?;
        Ok(number(ctx.outcome))
    }

    pub async fn delete(&self, resource: &str, id: &str) -> Result<u64, ScopeError> {
        self.delete_many(resource, Some(json!({ "id": id }))).await
    }
}

fn rows(outcome: Option<QueryOutcome>) -> Vec<RecordMap> {
    match outcome {
        Some(QueryOutcome::Rows(rows)) => rows,
        _ => Vec::new(),
    }
}

fn number(outcome: Option<QueryOutcome>) -> u64 {
    match outcome {
        Some(QueryOutcome::Count(n)) | Some(QueryOutcome::Affected(n)) => n,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{with_tenant, TenantContext, TenantId};
    use crate::database::memory::MemoryStore;

    fn org(id: &str) -> TenantContext {
        TenantContext::from_claim(TenantId::new(id).unwrap())
    }

    fn record(value: Value) -> RecordMap {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_unregistered_resource_passes_through() {
        let store = Arc::new(MemoryStore::new());
        store.seed("organizations", vec![record(json!({"id": "org-a"})), record(json!({"id": "org-b"}))]).await;
        let client = ScopedClient::new(store);

        let all = with_tenant(org("org-a"), client.find_many("organizations", FilterData::default())).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_update_returns_none_for_foreign_row() {
        let store = Arc::new(MemoryStore::new());
        store
            .seed("stations", vec![record(json!({"id": "s1", "organization_id": "org-b", "name": "Bravo"}))])
            .await;
        let client = ScopedClient::new(store.clone());

        let updated = with_tenant(org("org-a"), client.update("stations", "s1", record(json!({"name": "Hijacked"}))))
            .await
            .unwrap();
        assert!(updated.is_none());
        assert_eq!(store.dump("stations").await[0]["name"], json!("Bravo"));
    }

    #[tokio::test]
    async fn test_update_returns_fresh_row() {
        let store = Arc::new(MemoryStore::new());
        store
            .seed("stations", vec![record(json!({"id": "s1", "organization_id": "org-a", "name": "Alpha"}))])
            .await;
        let client = ScopedClient::new(store);

        let updated = with_tenant(org("org-a"), client.update("stations", "s1", record(json!({"name": "Alpha 2"}))))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated["name"], json!("Alpha 2"));
    }
}
