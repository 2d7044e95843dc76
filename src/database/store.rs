use async_trait::async_trait;
use serde_json::{Map, Value};

use super::manager::DatabaseError;
use crate::filter::FilterData;

/// One row as a JSON object keyed by column name.
pub type RecordMap = Map<String, Value>;

/// Raw data-access backend.
///
/// Applies exactly the predicates it is given. Tenant scoping happens above
/// this trait, in the observer pipeline, so every implementation gets it
/// for free.
#[async_trait]
pub trait DataStore: Send + Sync {
    fn name(&self) -> &'static str;

    async fn select(&self, resource: &str, filter: FilterData) -> Result<Vec<RecordMap>, DatabaseError>;

    async fn count(&self, resource: &str, where_clause: Option<Value>) -> Result<u64, DatabaseError>;

    /// Returns the stored rows, including generated columns.
    async fn insert(&self, resource: &str, records: Vec<RecordMap>) -> Result<Vec<RecordMap>, DatabaseError>;

    /// Returns the number of affected rows.
    async fn update(&self, resource: &str, where_clause: Option<Value>, changes: RecordMap) -> Result<u64, DatabaseError>;

    /// Returns the number of affected rows.
    async fn delete(&self, resource: &str, where_clause: Option<Value>) -> Result<u64, DatabaseError>;
}
