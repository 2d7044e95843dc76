use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;

use crate::cache::{backend_from_config, CacheBackend, MemoryCacheBackend, TenantCache};
use crate::config::AppConfig;
use crate::database::{DataStore, DatabaseError, DatabaseManager, MemoryStore, PgStore, ScopedClient};
use crate::services::{StoreOrganizationSource, TenantService};

/// Shared handles for request handlers and middleware
#[derive(Clone)]
pub struct AppState {
    pub client: ScopedClient,
    pub tenants: Arc<TenantService>,
    pub cache: TenantCache,
    /// Present when backed by PostgreSQL; used by the health probe
    pub pool: Option<PgPool>,
}

impl AppState {
    /// PostgreSQL store plus the configured cache backend
    pub async fn from_config(config: &AppConfig) -> Result<Self, DatabaseError> {
        let pool = DatabaseManager::main_pool().await?;
        let store: Arc<dyn DataStore> = Arc::new(PgStore::new(pool.clone()));
        let backend = backend_from_config(&config.cache).await;

        let mut state = Self::assemble(store, backend, config);
        state.pool = Some(pool);
        Ok(state)
    }

    /// Everything in process; used by tests and local demos
    pub fn in_memory(store: Arc<MemoryStore>) -> Self {
        let config = crate::config::config();
        let backend: Arc<dyn CacheBackend> = Arc::new(MemoryCacheBackend::new(config.cache.max_entries));
        Self::assemble(store, backend, config)
    }

    fn assemble(store: Arc<dyn DataStore>, backend: Arc<dyn CacheBackend>, config: &AppConfig) -> Self {
        let cache = if config.cache.enabled {
            TenantCache::new(backend.clone(), Duration::from_secs(config.cache.default_ttl_secs))
        } else {
            TenantCache::disabled()
        };

        let source = Arc::new(StoreOrganizationSource::new(store.clone()));
        let tenants = Arc::new(TenantService::from_config(source, backend));

        let client = ScopedClient::builder(store)
            .cache(cache.clone())
            .tenants(tenants.clone())
            .build();

        Self {
            client,
            tenants,
            cache,
            pool: None,
        }
    }
}
