use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::context::TenantId;
use crate::database::manager::DatabaseError;
use crate::database::store::DataStore;
use crate::filter::FilterData;

pub const ORGANIZATIONS: &str = "organizations";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionPlan {
    Free,
    Starter,
    Professional,
    Enterprise,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Canceled,
    Suspended,
    #[serde(other)]
    Unknown,
}

impl SubscriptionStatus {
    /// Past-due tenants keep access during the billing grace period
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active | Self::Trialing | Self::PastDue)
    }
}

/// A tenant as held by the system of record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
    pub subscription_plan: SubscriptionPlan,
    pub subscription_status: SubscriptionStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// System of record for tenant existence and status
#[async_trait]
pub trait OrganizationSource: Send + Sync {
    async fn find_organization(&self, id: &TenantId) -> Result<Option<Organization>, DatabaseError>;
}

/// Reads the `organizations` resource straight from a store, bypassing
/// tenant scoping (organizations are not tenant-owned rows).
pub struct StoreOrganizationSource {
    store: Arc<dyn DataStore>,
}

impl StoreOrganizationSource {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl OrganizationSource for StoreOrganizationSource {
    async fn find_organization(&self, id: &TenantId) -> Result<Option<Organization>, DatabaseError> {
        let filter = FilterData {
            where_clause: Some(json!({ "id": id.as_str() })),
            limit: Some(1),
            ..Default::default()
        };
        let Some(row) = self.store.select(ORGANIZATIONS, filter).await?.into_iter().next() else {
            return Ok(None);
        };
        serde_json::from_value(Value::Object(row))
            .map(Some)
            .map_err(|e| DatabaseError::QueryError(format!("Malformed organization {}: {}", id, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::MemoryStore;

    #[tokio::test]
    async fn test_finds_organization_by_id() {
        let store = Arc::new(MemoryStore::new());
        store
            .seed(
                ORGANIZATIONS,
                vec![json!({
                    "id": "org-a",
                    "name": "Acme Fuel",
                    "subscription_plan": "professional",
                    "subscription_status": "past_due",
                    "created_at": "2024-01-01T00:00:00Z"
                })
                .as_object()
                .cloned()
                .unwrap()],
            )
            .await;
        let source = StoreOrganizationSource::new(store);

        let org = source.find_organization(&TenantId::new("org-a").unwrap()).await.unwrap().unwrap();
        assert_eq!(org.subscription_plan, SubscriptionPlan::Professional);
        assert!(org.subscription_status.is_active());
        assert!(source.find_organization(&TenantId::new("org-z").unwrap()).await.unwrap().is_none());
    }

    #[test]
    fn test_unknown_status_is_inactive() {
        let status: SubscriptionStatus = serde_json::from_value(json!("incomplete_expired")).unwrap();
        assert_eq!(status, SubscriptionStatus::Unknown);
        assert!(!status.is_active());
        assert!(!SubscriptionStatus::Canceled.is_active());
    }
}
