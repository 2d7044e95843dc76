// Ring 6: Cache Invalidation - drops stale cached reads after a write
use std::sync::Arc;

use async_trait::async_trait;

use crate::cache::TenantCache;
use crate::observer::context::{ObserverContext, QueryOutcome};
use crate::observer::error::ObserverError;
use crate::observer::traits::{Observer, ObserverRing, Operation};
use crate::services::{TenantService, ORGANIZATIONS};

/// Clears the writing tenant's namespace for the written resource type.
/// Only the active tenant's keys are touched.
pub struct CacheInvalidationObserver {
    cache: TenantCache,
}

impl CacheInvalidationObserver {
    pub fn new(cache: TenantCache) -> Self {
        Self { cache }
    }
}

fn wrote_nothing(ctx: &ObserverContext) -> bool {
    matches!(
        ctx.outcome,
        None | Some(QueryOutcome::Affected(0)) | Some(QueryOutcome::Count(_))
    ) || matches!(&ctx.outcome, Some(QueryOutcome::Rows(rows)) if rows.is_empty())
}

#[async_trait]
impl Observer for CacheInvalidationObserver {
    fn name(&self) -> &'static str {
        "CacheInvalidationObserver"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::PostDatabase
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        op.is_write()
    }

    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
        if wrote_nothing(ctx) {
            return Ok(());
        }
        let Some(tenant) = &ctx.tenant else {
            return Ok(());
        };
        self.cache.invalidate(&tenant.tenant_id, Some(&ctx.resource)).await;
        Ok(())
    }
}

/// Keeps the tenant validation cache consistent with writes to `organizations`.
pub struct OrganizationInvalidationObserver {
    tenants: Arc<TenantService>,
}

impl OrganizationInvalidationObserver {
    pub fn new(tenants: Arc<TenantService>) -> Self {
        Self { tenants }
    }
}

#[async_trait]
impl Observer for OrganizationInvalidationObserver {
    fn name(&self) -> &'static str {
        "OrganizationInvalidationObserver"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::PostDatabase
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        op.is_write()
    }

    fn applies_to_resource(&self, resource: &str) -> bool {
        resource == ORGANIZATIONS
    }

    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
        if wrote_nothing(ctx) {
            return Ok(());
        }
        match &ctx.outcome {
            // New ids may have a cached negative answer
            Some(QueryOutcome::Rows(rows)) => {
                for id in rows.iter().filter_map(|row| row.get("id").and_then(|v| v.as_str())) {
                    self.tenants.invalidate(id).await;
                }
            }
            // The predicate may have matched any organization
            _ => self.tenants.invalidate_all().await,
        }
        Ok(())
    }
}
