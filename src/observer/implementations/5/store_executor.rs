// Ring 5: Store Executor - runs the (already scoped) operation against the store
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::database::store::DataStore;
use crate::observer::context::{ObserverContext, QueryOutcome};
use crate::observer::error::ObserverError;
use crate::observer::traits::{Observer, ObserverRing, Operation};

pub struct StoreExecutor {
    store: Arc<dyn DataStore>,
}

impl StoreExecutor {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Observer for StoreExecutor {
    fn name(&self) -> &'static str {
        "StoreExecutor"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Database
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(30)
    }

    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
        let query_start = Instant::now();
        let resource = ctx.resource.as_str();
        let where_clause = ctx.filter.where_clause.clone();

        let outcome = match ctx.operation {
            Operation::Select => QueryOutcome::Rows(self.store.select(resource, ctx.filter.clone()).await?),
            Operation::Count => QueryOutcome::Count(self.store.count(resource, where_clause).await?),
            Operation::Create => {
                let records = std::mem::take(&mut ctx.records);
                QueryOutcome::Rows(self.store.insert(resource, records).await?)
            }
            Operation::Update => {
                QueryOutcome::Affected(self.store.update(resource, where_clause, ctx.changes.clone()).await?)
            }
            Operation::Delete => QueryOutcome::Affected(self.store.delete(resource, where_clause).await?),
        };

        tracing::info!(
            "{:?} on {} via {} store: {} rows in {}ms",
            ctx.operation,
            ctx.resource,
            self.store.name(),
            match &outcome {
                QueryOutcome::Rows(rows) => rows.len() as u64,
                QueryOutcome::Count(n) | QueryOutcome::Affected(n) => *n,
            },
            query_start.elapsed().as_millis()
        );
        ctx.outcome = Some(outcome);
        Ok(())
    }
}
