use thiserror::Error;

use crate::database::manager::DatabaseError;

/// Observer system errors with structured error types
#[derive(Debug, Error)]
pub enum ObserverError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Tenant context required to write {resource}")]
    MissingTenantContext { resource: String },

    #[error("Timeout error: {0}")]
    TimeoutError(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Observer warnings (non-fatal issues)
#[derive(Debug, Clone)]
pub struct ObserverWarning {
    pub observer: String,
    pub ring: u8,
    pub message: String,
}

impl ObserverWarning {
    pub fn new(observer: &str, ring: u8, message: String) -> Self {
        Self {
            observer: observer.to_string(),
            ring,
            message,
        }
    }
}
