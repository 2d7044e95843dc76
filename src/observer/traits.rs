use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;

/// Observer rings with semantic meaning, executed in ascending order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ObserverRing {
    InputValidation = 1, // Identifier and predicate validation
    Security = 2,        // Tenant scoping
    Database = 5,        // Store execution
    PostDatabase = 6,    // Immediate processing after database operations
}

impl ObserverRing {
    pub const ALL: [ObserverRing; 4] = [
        ObserverRing::InputValidation,
        ObserverRing::Security,
        ObserverRing::Database,
        ObserverRing::PostDatabase,
    ];

    /// Errors in these rings abort the operation before it reaches the store
    pub fn is_pre_database(&self) -> bool {
        (*self as u8) < (ObserverRing::Database as u8)
    }
}

/// Data-access operations routed through the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Select,
    Count,
    Create,
    Update,
    Delete,
}

impl Operation {
    pub fn is_read(&self) -> bool {
        matches!(self, Operation::Select | Operation::Count)
    }

    pub fn is_write(&self) -> bool {
        !self.is_read()
    }
}

/// A unit of work in one ring of the pipeline
#[async_trait]
pub trait Observer: Send + Sync {
    /// Observer name for logging and debugging
    fn name(&self) -> &'static str;

    /// Which ring this observer belongs to
    fn ring(&self) -> ObserverRing;

    fn applies_to_operation(&self, _op: Operation) -> bool {
        true
    }

    fn applies_to_resource(&self, _resource: &str) -> bool {
        true
    }

    /// Execution timeout (default 5 seconds)
    fn timeout(&self) -> Duration {
        Duration::from_secs(5)
    }

    /// Priority within ring (lower numbers execute first)
    fn priority(&self) -> u8 {
        50
    }

    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError>;
}
