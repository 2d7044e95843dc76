pub mod manager;
pub mod memory;
pub mod postgres;
pub mod registry;
pub mod scoped;
pub mod store;

pub use manager::{DatabaseError, DatabaseManager};
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use registry::{ResourceRegistry, DEFAULT_SCOPED_RESOURCES};
pub use scoped::{ScopeError, ScopedClient, ScopedClientBuilder};
pub use store::{DataStore, RecordMap};
