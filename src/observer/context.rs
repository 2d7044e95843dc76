use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::time::Instant;

use serde_json::Value;

use crate::context::{self, TenantContext};
use crate::database::store::RecordMap;
use crate::filter::FilterData;
use crate::observer::error::{ObserverError, ObserverWarning};
use crate::observer::traits::{ObserverRing, Operation};

/// Result produced by the database ring (or short-circuited by the security ring)
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Rows(Vec<RecordMap>),
    Count(u64),
    Affected(u64),
}

/// The data structure that flows through the observer pipeline
#[derive(Debug)]
pub struct ObserverContext {
    // Core request data
    pub operation: Operation,
    pub resource: String,

    /// Tenant captured from the request scope when the operation started
    pub tenant: Option<TenantContext>,

    // Select/count use the whole filter; update/delete only its WHERE
    pub filter: FilterData,

    // Create input
    pub records: Vec<RecordMap>,

    // Update payload
    pub changes: RecordMap,

    /// Set when the operation must not reach the store
    pub skip_database: bool,

    // Populated by Ring 5, or by Ring 2 when it short-circuits
    pub outcome: Option<QueryOutcome>,

    // Type-safe metadata storage for cross-observer communication
    metadata: HashMap<TypeId, Box<dyn Any + Send + Sync>>,

    // Performance tracking
    pub start_time: Instant,
    pub current_ring: Option<ObserverRing>,

    // Error and warning accumulation
    pub errors: Vec<ObserverError>,
    pub warnings: Vec<ObserverWarning>,
}

impl ObserverContext {
    fn new(operation: Operation, resource: &str) -> Self {
        Self {
            operation,
            resource: resource.to_string(),
            tenant: context::get(),
            filter: FilterData::default(),
            records: Vec::new(),
            changes: RecordMap::new(),
            skip_database: false,
            outcome: None,
            metadata: HashMap::new(),
            start_time: Instant::now(),
            current_ring: None,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn select(resource: &str, filter: FilterData) -> Self {
        Self { filter, ..Self::new(Operation::Select, resource) }
    }

    pub fn count(resource: &str, where_clause: Option<Value>) -> Self {
        Self::with_where(Operation::Count, resource, where_clause)
    }

    pub fn create(resource: &str, records: Vec<RecordMap>) -> Self {
        Self { records, ..Self::new(Operation::Create, resource) }
    }

    pub fn update(resource: &str, where_clause: Option<Value>, changes: RecordMap) -> Self {
        Self { changes, ..Self::with_where(Operation::Update, resource, where_clause) }
    }

    pub fn delete(resource: &str, where_clause: Option<Value>) -> Self {
        Self::with_where(Operation::Delete, resource, where_clause)
    }

    fn with_where(operation: Operation, resource: &str, where_clause: Option<Value>) -> Self {
        let filter = FilterData { where_clause, ..Default::default() };
        Self { filter, ..Self::new(operation, resource) }
    }

    /// Store typed metadata
    pub fn set_metadata<T: Send + Sync + 'static>(&mut self, data: T) {
        self.metadata.insert(TypeId::of::<T>(), Box::new(data));
    }

    /// Retrieve typed metadata
    pub fn get_metadata<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.metadata.get(&TypeId::of::<T>()).and_then(|boxed| boxed.downcast_ref::<T>())
    }

    pub fn add_warning(&mut self, warning: ObserverWarning) {
        self.warnings.push(warning);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Get total execution time
    pub fn execution_time(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }

    /// Rows affected or returned by the operation, for logging
    pub fn outcome_size(&self) -> u64 {
        match &self.outcome {
            Some(QueryOutcome::Rows(rows)) => rows.len() as u64,
            Some(QueryOutcome::Count(n)) | Some(QueryOutcome::Affected(n)) => *n,
            None => 0,
        }
    }
}
