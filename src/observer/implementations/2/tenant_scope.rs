// Ring 2: Tenant Scope - confines every operation to the active tenant
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::database::registry::ResourceRegistry;
use crate::filter::TenantPredicate;
use crate::observer::context::{ObserverContext, QueryOutcome};
use crate::observer::error::{ObserverError, ObserverWarning};
use crate::observer::traits::{Observer, ObserverRing, Operation};

/// What the security ring decided for one operation.
#[derive(Debug, Clone, PartialEq)]
pub enum ScopeDecision {
    /// Predicate conjoined (reads, update, delete) or stamped (create)
    Scoped(TenantPredicate),
    /// No tenant in scope: the store is never reached
    Denied,
}

/// Reads and mutations get `AND <tenant column> = T` at the outermost level.
/// Creates get the tenant column stamped, overriding the caller's value.
/// Without a tenant in scope, reads come back empty, mutations affect zero
/// rows and creates fail.
pub struct TenantScopeObserver {
    registry: Arc<ResourceRegistry>,
}

impl TenantScopeObserver {
    pub fn new(registry: Arc<ResourceRegistry>) -> Self {
        Self { registry }
    }

    fn deny(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
        if ctx.operation == Operation::Create {
            warn!(resource = %ctx.resource, "Create rejected: no tenant context");
            return Err(ObserverError::MissingTenantContext { resource: ctx.resource.clone() });
        }
        if crate::config::config().tenant.log_missing_context {
            warn!(
                resource = %ctx.resource,
                operation = ?ctx.operation,
                "Tenant-scoped query without tenant context, returning empty result"
            );
        }
        ctx.skip_database = true;
        ctx.outcome = Some(match ctx.operation {
            Operation::Select => QueryOutcome::Rows(Vec::new()),
            Operation::Count => QueryOutcome::Count(0),
            _ => QueryOutcome::Affected(0),
        });
        ctx.set_metadata(ScopeDecision::Denied);
        Ok(())
    }
}

#[async_trait]
impl Observer for TenantScopeObserver {
    fn name(&self) -> &'static str {
        "TenantScopeObserver"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Security
    }

    fn applies_to_resource(&self, resource: &str) -> bool {
        self.registry.is_scoped(resource)
    }

    fn priority(&self) -> u8 {
        10
    }

    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
        let Some(column) = self.registry.tenant_column(&ctx.resource) else {
            return Ok(());
        };
        let Some(tenant) = ctx.tenant.clone() else {
            return self.deny(ctx);
        };
        let predicate = TenantPredicate::new(column, tenant.tenant_id);

        match ctx.operation {
            Operation::Create => {
                let mut spoofed = 0usize;
                for record in ctx.records.iter_mut() {
                    if predicate.stamp(record).is_some() {
                        spoofed += 1;
                    }
                }
                if spoofed > 0 {
                    warn!(
                        resource = %ctx.resource,
                        tenant = %predicate.tenant_id(),
                        spoofed,
                        "Overrode caller-supplied tenant on create"
                    );
                    ctx.add_warning(ObserverWarning::new(
                        self.name(),
                        self.ring() as u8,
                        format!("{} record(s) carried a foreign {}", spoofed, column),
                    ));
                }
            }
            Operation::Update => {
                if ctx.changes.remove(column).is_some() {
                    warn!(resource = %ctx.resource, "Ignoring attempt to change {} in update", column);
                    ctx.add_warning(ObserverWarning::new(
                        self.name(),
                        self.ring() as u8,
                        format!("{} cannot be updated", column),
                    ));
                    if ctx.changes.is_empty() {
                        return Err(ObserverError::ValidationError(format!(
                            "Update of {} has no writable columns",
                            ctx.resource
                        )));
                    }
                }
                ctx.filter.where_clause = Some(predicate.apply(ctx.filter.where_clause.take()));
            }
            Operation::Select | Operation::Count | Operation::Delete => {
                ctx.filter.where_clause = Some(predicate.apply(ctx.filter.where_clause.take()));
            }
        }

        debug!(resource = %ctx.resource, tenant = %predicate.tenant_id(), "Applied tenant scope");
        ctx.set_metadata(ScopeDecision::Scoped(predicate));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{with_tenant, TenantContext, TenantId};
    use crate::filter::FilterData;
    use serde_json::json;

    fn observer() -> TenantScopeObserver {
        TenantScopeObserver::new(Arc::new(ResourceRegistry::new("organization_id").register("stations").clone()))
    }

    fn org_a() -> TenantContext {
        TenantContext::from_claim(TenantId::new("org-a").unwrap())
    }

    #[tokio::test]
    async fn test_select_gets_outermost_tenant_conjunct() {
        let mut ctx = with_tenant(org_a(), async {
            ObserverContext::select("stations", FilterData::with_where(json!({"$or": [{"a": 1}, {"b": 2}]})))
        })
        .await;
        observer().execute(&mut ctx).await.unwrap();
        assert_eq!(
            ctx.filter.where_clause,
            Some(json!({"$and": [{"organization_id": {"$eq": "org-a"}}, {"$or": [{"a": 1}, {"b": 2}]}]}))
        );
        assert!(matches!(ctx.get_metadata::<ScopeDecision>(), Some(ScopeDecision::Scoped(_))));
    }

    #[tokio::test]
    async fn test_create_without_tenant_is_rejected() {
        let record = json!({"name": "Alpha"}).as_object().cloned().unwrap();
        let mut ctx = ObserverContext::create("stations", vec![record]);
        let err = observer().execute(&mut ctx).await.unwrap_err();
        assert!(matches!(err, ObserverError::MissingTenantContext { resource } if resource == "stations"));
    }

    #[tokio::test]
    async fn test_read_without_tenant_short_circuits_empty() {
        let mut ctx = ObserverContext::count("stations", None);
        observer().execute(&mut ctx).await.unwrap();
        assert!(ctx.skip_database);
        assert_eq!(ctx.outcome, Some(QueryOutcome::Count(0)));
    }

    #[tokio::test]
    async fn test_update_cannot_rehome_rows() {
        let changes = json!({"name": "Beta", "organization_id": "org-b"}).as_object().cloned().unwrap();
        let mut ctx = with_tenant(org_a(), async { ObserverContext::update("stations", None, changes) }).await;
        observer().execute(&mut ctx).await.unwrap();
        assert!(!ctx.changes.contains_key("organization_id"));
        assert_eq!(ctx.warnings.len(), 1);
        assert_eq!(ctx.filter.where_clause, Some(json!({"organization_id": {"$eq": "org-a"}})));
    }
}
