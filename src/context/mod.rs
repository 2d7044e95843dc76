//! Request-scoped tenant context.
//!
//! The active tenant lives in a tokio task-local, so it is bound to the
//! logical request that set it and is never visible to other tasks, even
//! when requests interleave on the same worker thread. The scope is torn
//! down when the wrapped future completes, panics or is dropped, which
//! means a cancelled request cannot leave its tenant behind for the next
//! request scheduled on that thread.

use std::cell::RefCell;
use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinHandle;

tokio::task_local! {
    static CURRENT_TENANT: RefCell<Option<TenantContext>>;
}

/// Identifier of an organization (tenant). Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// Returns `None` for empty or whitespace-only identifiers.
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TenantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Where the active tenant id came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantSource {
    /// Organization claim of the authenticated token
    Claim,
    /// Explicit override header on a privileged request
    Override,
    /// Internal job or maintenance code acting for a tenant
    System,
}

/// The tenant a unit of work is acting for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    pub tenant_id: TenantId,
    pub source: TenantSource,
}

impl TenantContext {
    pub fn new(tenant_id: TenantId, source: TenantSource) -> Self {
        Self { tenant_id, source }
    }

    pub fn from_claim(tenant_id: TenantId) -> Self {
        Self::new(tenant_id, TenantSource::Claim)
    }

    pub fn from_override(tenant_id: TenantId) -> Self {
        Self::new(tenant_id, TenantSource::Override)
    }

    pub fn system(tenant_id: TenantId) -> Self {
        Self::new(tenant_id, TenantSource::System)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContextError {
    #[error("No tenant context scope is active on this task")]
    NoActiveScope,
}

/// Run `future` with `ctx` as the active tenant.
///
/// The context is cleared on every exit path, including cancellation.
/// Nested calls shadow the outer tenant and restore it afterwards.
pub async fn with_tenant<F>(ctx: TenantContext, future: F) -> F::Output
where
    F: Future,
{
    tracing::trace!(tenant = %ctx.tenant_id, source = ?ctx.source, "entering tenant scope");
    CURRENT_TENANT.scope(RefCell::new(Some(ctx)), future).await
}

/// Run `future` with an explicit "no tenant" context.
pub async fn without_tenant<F>(future: F) -> F::Output
where
    F: Future,
{
    CURRENT_TENANT.scope(RefCell::new(None), future).await
}

/// Synchronous variant of [`with_tenant`] for non-async call paths.
pub fn with_tenant_sync<R>(ctx: TenantContext, f: impl FnOnce() -> R) -> R {
    CURRENT_TENANT.sync_scope(RefCell::new(Some(ctx)), f)
}

/// Replace the tenant of the enclosing scope.
pub fn set(ctx: TenantContext) -> Result<(), ContextError> {
    CURRENT_TENANT
        .try_with(move |cell| {
            *cell.borrow_mut() = Some(ctx);
        })
        .map_err(|_| ContextError::NoActiveScope)
}

/// Active tenant context, or `None` outside any scope.
pub fn get() -> Option<TenantContext> {
    CURRENT_TENANT
        .try_with(|cell| cell.borrow().clone())
        .ok()
        .flatten()
}

pub fn current_tenant() -> Option<TenantId> {
    get().map(|ctx| ctx.tenant_id)
}

/// Clear the tenant of the enclosing scope. No-op outside a scope.
pub fn clear() {
    let _ = CURRENT_TENANT.try_with(|cell| cell.borrow_mut().take());
}

/// Spawn a task that runs under the caller's current tenant context.
///
/// Task-locals are not inherited by `tokio::spawn`; this captures the
/// context at spawn time and installs a fresh scope inside the new task.
pub fn spawn_with_tenant<F>(future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let ctx = get();
    tokio::spawn(CURRENT_TENANT.scope(RefCell::new(ctx), future))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn tenant(id: &str) -> TenantContext {
        TenantContext::from_claim(TenantId::new(id).unwrap())
    }

    #[test]
    fn test_tenant_id_rejects_blank() {
        assert!(TenantId::new("").is_none());
        assert!(TenantId::new("   ").is_none());
        assert_eq!(TenantId::new(" org-a ").unwrap().as_str(), "org-a");
    }

    #[tokio::test]
    async fn test_get_outside_scope_is_none() {
        assert!(get().is_none());
        assert_eq!(set(tenant("org-a")), Err(ContextError::NoActiveScope));
        clear();
        assert!(get().is_none());
    }

    #[tokio::test]
    async fn test_with_tenant_sets_and_clears() {
        let seen = with_tenant(tenant("org-a"), async { current_tenant() }).await;
        assert_eq!(seen.unwrap().as_str(), "org-a");
        assert!(current_tenant().is_none());
    }

    #[tokio::test]
    async fn test_set_and_clear_inside_scope() {
        without_tenant(async {
            assert!(get().is_none());
            set(tenant("org-b")).unwrap();
            assert_eq!(current_tenant().unwrap().as_str(), "org-b");
            clear();
            assert!(get().is_none());
        })
        .await;
    }

    #[tokio::test]
    async fn test_nested_scope_restores_outer() {
        with_tenant(tenant("outer"), async {
            with_tenant(tenant("inner"), async {
                assert_eq!(current_tenant().unwrap().as_str(), "inner");
            })
            .await;
            assert_eq!(current_tenant().unwrap().as_str(), "outer");
        })
        .await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_interleaved_requests_do_not_observe_each_other() {
        let mut handles = Vec::new();
        for i in 0..32 {
            let id = format!("org-{}", i);
            handles.push(tokio::spawn(with_tenant(tenant(&id), async move {
                for _ in 0..10 {
                    tokio::task::yield_now().await;
                    assert_eq!(current_tenant().unwrap().as_str(), id);
                }
            })));
        }
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_cancelled_scope_leaves_nothing_behind() {
        let slow = with_tenant(tenant("org-a"), async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        });
        let timed_out = tokio::time::timeout(Duration::from_millis(10), slow).await;
        assert!(timed_out.is_err());
        assert!(get().is_none());
    }

    #[tokio::test]
    async fn test_spawn_with_tenant_propagates_context() {
        let handle = with_tenant(tenant("org-a"), async {
            spawn_with_tenant(async { current_tenant() })
        })
        .await;
        assert_eq!(handle.await.unwrap().unwrap().as_str(), "org-a");

        let plain = with_tenant(tenant("org-a"), async { tokio::spawn(async { current_tenant() }) }).await;
        assert!(plain.await.unwrap().is_none());
    }

    #[test]
    fn test_sync_scope() {
        let seen = with_tenant_sync(tenant("org-s"), current_tenant);
        assert_eq!(seen.unwrap().as_str(), "org-s");
        assert!(current_tenant().is_none());
    }
}
