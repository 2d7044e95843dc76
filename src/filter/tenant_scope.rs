use serde_json::{json, Map, Value};

use crate::context::TenantId;

/// Equality predicate on the owning-tenant column.
///
/// Applied as the outermost conjunct: `{"$and": [tenant, caller]}`. The
/// caller's predicate keeps its own structure, so nested `$or`/`$not`
/// cannot widen the result past the tenant boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct TenantPredicate {
    column: String,
    tenant_id: TenantId,
}

impl TenantPredicate {
    pub fn new(column: impl Into<String>, tenant_id: TenantId) -> Self {
        Self { column: column.into(), tenant_id }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    pub fn to_where(&self) -> Value {
        let mut condition = Map::new();
        condition.insert(self.column.clone(), json!({ "$eq": self.tenant_id.as_str() }));
        Value::Object(condition)
    }

    pub fn apply(&self, where_clause: Option<Value>) -> Value {
        match where_clause {
            None | Some(Value::Null) => self.to_where(),
            Some(Value::Object(obj)) if obj.is_empty() => self.to_where(),
            Some(caller) => json!({ "$and": [self.to_where(), caller] }),
        }
    }

    /// Overwrite the owning-tenant column of a record being created.
    /// Returns the caller-supplied value when it differed.
    pub fn stamp(&self, record: &mut Map<String, Value>) -> Option<Value> {
        let stamped = Value::String(self.tenant_id.as_str().to_string());
        match record.insert(self.column.clone(), stamped.clone()) {
            Some(previous) if previous != stamped => Some(previous),
            _ => None,
        }
    }
}
