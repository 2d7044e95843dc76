// Ring 1: Filter Validation - rejects malformed identifiers and predicates
use async_trait::async_trait;

use crate::database::store::RecordMap;
use crate::filter::filter::is_identifier;
use crate::filter::filter_where::FilterWhere;
use crate::filter::Filter;
use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::traits::{Observer, ObserverRing, Operation};

/// Validates everything that will later be rendered into SQL, so a bad
/// predicate fails the same way on every store backend.
#[derive(Default)]
pub struct FilterValidationObserver;

#[async_trait]
impl Observer for FilterValidationObserver {
    fn name(&self) -> &'static str {
        "FilterValidationObserver"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::InputValidation
    }

    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
        Filter::validate_table_name(&ctx.resource).map_err(invalid)?;

        match ctx.operation {
            Operation::Select => {
                Filter::new(&ctx.resource).map_err(invalid)?.assign(ctx.filter.clone()).map_err(invalid)?;
            }
            Operation::Count | Operation::Delete => validate_where(ctx)?,
            Operation::Update => {
                validate_where(ctx)?;
                if ctx.changes.is_empty() {
                    return Err(ObserverError::ValidationError("Update requires at least one column".to_string()));
                }
                validate_columns(&ctx.changes)?;
            }
            Operation::Create => {
                for record in &ctx.records {
                    validate_columns(record)?;
                }
            }
        }
        Ok(())
    }
}

fn validate_where(ctx: &ObserverContext) -> Result<(), ObserverError> {
    match &ctx.filter.where_clause {
        Some(where_clause) => FilterWhere::validate(where_clause).map_err(invalid),
        None => Ok(()),
    }
}

fn validate_columns(record: &RecordMap) -> Result<(), ObserverError> {
    match record.keys().find(|column| !is_identifier(column)) {
        Some(column) => Err(ObserverError::ValidationError(format!("Invalid column name: {}", column))),
        None => Ok(()),
    }
}

fn invalid(e: crate::filter::FilterError) -> ObserverError {
    ObserverError::ValidationError(e.to_string())
}
