use std::time::Duration;

use async_trait::async_trait;

use super::error::CacheResult;

/// String key/value store with per-entry TTL.
///
/// Values are opaque serialized payloads. Callers above this trait treat
/// every error as a miss, so implementations report failures instead of
/// retrying.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    async fn mget(&self, keys: &[String]) -> CacheResult<Vec<Option<String>>> {
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            values.push(self.get(key).await?);
        }
        Ok(values)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> CacheResult<()>;

    /// Returns true when an entry was removed.
    async fn delete(&self, key: &str) -> CacheResult<bool>;

    /// Removes every key starting with `prefix`; returns the number removed.
    async fn delete_prefix(&self, prefix: &str) -> CacheResult<u64>;
}
