// Observer implementations organized by rings

// Ring 1: Input Validation
#[path = "1/filter_validation.rs"]
pub mod filter_validation;

// Ring 2: Security - tenant scoping
#[path = "2/tenant_scope.rs"]
pub mod tenant_scope;

// Ring 5: Database - store execution
#[path = "5/store_executor.rs"]
pub mod store_executor;

// Ring 6: Post-Database - cache consistency
#[path = "6/cache_invalidation.rs"]
pub mod cache_invalidation;

pub use cache_invalidation::{CacheInvalidationObserver, OrganizationInvalidationObserver};
pub use filter_validation::FilterValidationObserver;
pub use store_executor::StoreExecutor;
pub use tenant_scope::{ScopeDecision, TenantScopeObserver};
