// Tenant validation and object caching
//
// CacheBackend (trait)
//   ├── MemoryCacheBackend   dashmap, TTL + capacity bound
//   └── RedisCacheBackend    ConnectionManager, SCAN for prefix deletes ("redis" feature)

pub mod backend;
pub mod error;
pub mod key;
pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;
pub mod tenant_cache;

pub use backend::CacheBackend;
pub use error::{CacheError, CacheResult};
pub use key::CacheKey;
pub use memory::MemoryCacheBackend;
#[cfg(feature = "redis")]
pub use self::redis::RedisCacheBackend;
pub use tenant_cache::TenantCache;

use std::sync::Arc;

use crate::config::CacheConfig;

/// Backend selected by configuration: Redis when a URL is configured and the
/// feature is compiled in, otherwise the in-process map.
pub async fn backend_from_config(config: &CacheConfig) -> Arc<dyn CacheBackend> {
    #[cfg(feature = "redis")]
    {
        if let Some(url) = &config.redis_url {
            match RedisCacheBackend::connect(url).await {
                Ok(backend) => return Arc::new(backend),
                Err(e) => tracing::warn!(error = %e, "Redis unavailable, falling back to memory cache"),
            }
        }
    }
    #[cfg(not(feature = "redis"))]
    {
        if config.redis_url.is_some() {
            tracing::warn!("REDIS_URL set but built without the redis feature, using memory cache");
        }
    }
    Arc::new(MemoryCacheBackend::new(config.max_entries))
}
