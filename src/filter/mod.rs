pub mod types;
pub mod filter;
pub mod filter_where;
pub mod filter_order;
pub mod filter_match;
pub mod tenant_scope;
pub mod error;

pub use types::*;
pub use filter::Filter;
pub use filter_match::FilterMatch;
pub use tenant_scope::TenantPredicate;
pub use error::FilterError;
