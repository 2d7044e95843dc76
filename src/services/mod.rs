pub mod organization_source;
pub mod tenant_service;

pub use organization_source::{
    Organization, OrganizationSource, StoreOrganizationSource, SubscriptionPlan, SubscriptionStatus, ORGANIZATIONS,
};
pub use tenant_service::{TenantError, TenantService, TenantStatus};
