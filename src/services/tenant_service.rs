use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cache::{CacheBackend, CacheKey};
use crate::context::TenantId;
use crate::database::manager::DatabaseError;
use crate::services::organization_source::{Organization, OrganizationSource};

/// Memoized answer to "may this tenant act right now?"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantStatus {
    Active,
    Inactive,
    Missing,
}

#[derive(Debug, thiserror::Error)]
pub enum TenantError {
    #[error("Tenant identifier is missing")]
    MissingTenantId,
    #[error("Tenant not found: {0}")]
    TenantNotFound(String),
    #[error("Tenant is not active: {0}")]
    TenantInactive(String),
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Tenant validation backed by the system of record, memoized with a TTL.
///
/// Negative answers are cached too. A failing cache backend degrades to a
/// direct lookup; a failing system of record is never cached.
pub struct TenantService {
    source: Arc<dyn OrganizationSource>,
    cache: Option<Arc<dyn CacheBackend>>,
    ttl: Duration,
}

impl TenantService {
    pub fn new(source: Arc<dyn OrganizationSource>, cache: Arc<dyn CacheBackend>, ttl: Duration) -> Self {
        Self {
            source,
            cache: Some(cache),
            ttl,
        }
    }

    /// TTL taken from configuration
    pub fn from_config(source: Arc<dyn OrganizationSource>, cache: Arc<dyn CacheBackend>) -> Self {
        let ttl = Duration::from_secs(crate::config::config().tenant.validation_ttl_secs);
        Self::new(source, cache, ttl)
    }

    /// Every call goes to the system of record
    pub fn uncached(source: Arc<dyn OrganizationSource>) -> Self {
        Self {
            source,
            cache: None,
            ttl: Duration::ZERO,
        }
    }

    /// True when the tenant exists and is active. Empty ids are false
    /// without touching the cache.
    pub async fn validate(&self, tenant_id: &str) -> bool {
        let Some(tenant_id) = TenantId::new(tenant_id) else {
            return false;
        };
        match self.status(&tenant_id).await {
            Ok(status) => status == TenantStatus::Active,
            Err(e) => {
                warn!(tenant = %tenant_id, error = %e, "Tenant validation failed, denying");
                false
            }
        }
    }

    /// Like `validate`, but says why a tenant was refused
    pub async fn resolve(&self, tenant_id: &str) -> Result<TenantId, TenantError> {
        let tenant = TenantId::new(tenant_id).ok_or(TenantError::MissingTenantId)?;
        match self.status(&tenant).await? {
            TenantStatus::Active => Ok(tenant),
            TenantStatus::Inactive => Err(TenantError::TenantInactive(tenant.to_string())),
            TenantStatus::Missing => Err(TenantError::TenantNotFound(tenant.to_string())),
        }
    }

    pub async fn status(&self, tenant_id: &TenantId) -> Result<TenantStatus, TenantError> {
        let key = CacheKey::validation(tenant_id);
        if let Some(status) = self.cached(&key).await {
            debug!(tenant = %tenant_id, ?status, "Tenant validation cache hit");
            return Ok(status);
        }

        let status = match self.source.find_organization(tenant_id).await? {
            Some(org) if org.subscription_status.is_active() => TenantStatus::Active,
            Some(_) => TenantStatus::Inactive,
            None => TenantStatus::Missing,
        };
        self.store(&key, status).await;
        debug!(tenant = %tenant_id, ?status, "Tenant validation cache populated");
        Ok(status)
    }

    /// Direct lookup, never cached
    pub async fn get_organization(&self, tenant_id: &TenantId) -> Result<Option<Organization>, TenantError> {
        Ok(self.source.find_organization(tenant_id).await?)
    }

    /// Drop one memoized result; call whenever the organization changes
    pub async fn invalidate(&self, tenant_id: &str) {
        let (Some(tenant_id), Some(cache)) = (TenantId::new(tenant_id), &self.cache) else {
            return;
        };
        if let Err(e) = cache.delete(&CacheKey::validation(&tenant_id)).await {
            warn!(tenant = %tenant_id, error = %e, "Failed to invalidate tenant validation entry");
        }
    }

    pub async fn invalidate_all(&self) {
        let Some(cache) = &self.cache else { return };
        match cache.delete_prefix(CacheKey::validation_prefix()).await {
            Ok(removed) => info!(removed, "Cleared tenant validation cache"),
            Err(e) => warn!(error = %e, "Failed to clear tenant validation cache"),
        }
    }

    async fn cached(&self, key: &str) -> Option<TenantStatus> {
        let cache = self.cache.as_ref()?;
        match cache.get(key).await {
            Ok(raw) => raw.and_then(|v| serde_json::from_str(&v).ok()),
            Err(e) => {
                warn!(backend = cache.name(), error = %e, "Validation cache read failed, querying source");
                None
            }
        }
    }

    async fn store(&self, key: &str, status: TenantStatus) {
        let Some(cache) = &self.cache else { return };
        let payload = match serde_json::to_string(&status) {
            Ok(payload) => payload,
            Err(_) => return,
        };
        if let Err(e) = cache.set(key, payload, self.ttl).await {
            warn!(backend = cache.name(), error = %e, "Validation cache write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCacheBackend;
    use crate::services::organization_source::{SubscriptionPlan, SubscriptionStatus};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingSource {
        orgs: Mutex<HashMap<String, SubscriptionStatus>>,
        lookups: AtomicUsize,
        fail: bool,
    }

    impl CountingSource {
        fn with(orgs: &[(&str, SubscriptionStatus)]) -> Self {
            let source = Self::default();
            for (id, status) in orgs {
                source.orgs.lock().unwrap().insert(id.to_string(), *status);
            }
            source
        }

        fn lookups(&self) -> usize {
            self.lookups.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl OrganizationSource for CountingSource {
        async fn find_organization(&self, id: &TenantId) -> Result<Option<Organization>, DatabaseError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(DatabaseError::QueryError("connection refused".into()));
            }
            Ok(self.orgs.lock().unwrap().get(id.as_str()).map(|status| Organization {
                id: id.to_string(),
                name: "Acme".into(),
                subscription_plan: SubscriptionPlan::Starter,
                subscription_status: *status,
                created_at: None,
                updated_at: None,
            }))
        }
    }

    fn service(source: Arc<CountingSource>) -> TenantService {
        TenantService::new(source, Arc::new(MemoryCacheBackend::new(64)), Duration::from_secs(600))
    }

    #[tokio::test]
    async fn test_hit_within_ttl_skips_source() {
        let source = Arc::new(CountingSource::with(&[("org-a", SubscriptionStatus::Active)]));
        let tenants = service(source.clone());
        assert!(tenants.validate("org-a").await);
        assert!(tenants.validate("org-a").await);
        assert_eq!(source.lookups(), 1);
    }

    #[tokio::test]
    async fn test_empty_id_is_false_without_lookup() {
        let source = Arc::new(CountingSource::default());
        let tenants = service(source.clone());
        assert!(!tenants.validate("").await);
        assert!(!tenants.validate("   ").await);
        assert_eq!(source.lookups(), 0);
    }

    #[tokio::test]
    async fn test_deleted_tenant_is_false_after_invalidate() {
        let source = Arc::new(CountingSource::with(&[("org-a", SubscriptionStatus::Active)]));
        let tenants = service(source.clone());
        assert!(tenants.validate("org-a").await);

        source.orgs.lock().unwrap().remove("org-a");
        assert!(tenants.validate("org-a").await, "stale within TTL until invalidated");

        tenants.invalidate("org-a").await;
        assert!(!tenants.validate("org-a").await);
        assert_eq!(source.lookups(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let source = Arc::new(CountingSource::with(&[("org-a", SubscriptionStatus::Active)]));
        let tenants = service(source.clone());
        assert!(tenants.validate("org-a").await);
        source.orgs.lock().unwrap().insert("org-a".into(), SubscriptionStatus::Canceled);

        tokio::time::advance(Duration::from_secs(601)).await;
        assert!(!tenants.validate("org-a").await);
    }

    #[tokio::test]
    async fn test_negative_results_are_cached_until_invalidate_all() {
        let source = Arc::new(CountingSource::default());
        let tenants = service(source.clone());
        assert!(!tenants.validate("org-new").await);
        assert!(!tenants.validate("org-new").await);
        assert_eq!(source.lookups(), 1);

        source.orgs.lock().unwrap().insert("org-new".into(), SubscriptionStatus::Trialing);
        tenants.invalidate_all().await;
        assert!(tenants.validate("org-new").await);
    }

    #[tokio::test]
    async fn test_resolve_reports_reason() {
        let source = Arc::new(CountingSource::with(&[("org-s", SubscriptionStatus::Suspended)]));
        let tenants = service(source);
        assert!(matches!(tenants.resolve("org-s").await, Err(TenantError::TenantInactive(_))));
        assert!(matches!(tenants.resolve("org-x").await, Err(TenantError::TenantNotFound(_))));
        assert!(matches!(tenants.resolve("").await, Err(TenantError::MissingTenantId)));
    }

    #[tokio::test]
    async fn test_source_failure_denies_and_is_not_cached() {
        let source = Arc::new(CountingSource { fail: true, ..Default::default() });
        let tenants = service(source.clone());
        assert!(!tenants.validate("org-a").await);
        assert!(!tenants.validate("org-a").await);
        assert_eq!(source.lookups(), 2);
    }
}
