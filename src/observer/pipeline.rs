// Observer pipeline: every data-access call runs the rings in order

use std::collections::HashMap;
use std::time::Instant;

use tokio::time::timeout;

use crate::observer::context::ObserverContext;
use crate::observer::error::{ObserverError, ObserverWarning};
use crate::observer::traits::{Observer, ObserverRing};

/// Executes registered observers ring by ring.
///
/// An error in a pre-database ring aborts the operation before the store is
/// touched. Errors from the database ring are returned as-is. Post-database
/// failures are downgraded to warnings: the write has already happened.
pub struct ObserverPipeline {
    observers: HashMap<ObserverRing, Vec<Box<dyn Observer>>>,
}

impl ObserverPipeline {
    pub fn new() -> Self {
        Self { observers: HashMap::new() }
    }

    pub fn register(&mut self, observer: Box<dyn Observer>) {
        let ring = observer.ring();
        let name = observer.name();
        let ring_observers = self.observers.entry(ring).or_default();
        ring_observers.push(observer);
        ring_observers.sort_by_key(|o| o.priority());

        tracing::debug!("Registered observer '{}' for ring {:?}", name, ring);
    }

    pub fn observer_names(&self, ring: ObserverRing) -> Vec<&'static str> {
        self.observers
            .get(&ring)
            .map(|observers| observers.iter().map(|o| o.name()).collect())
            .unwrap_or_default()
    }

    pub async fn execute(&self, mut ctx: ObserverContext) -> Result<ObserverContext, ObserverError> {
        tracing::debug!(
            "Observer pipeline starting: operation={:?}, resource={}, tenant={:?}",
            ctx.operation,
            ctx.resource,
            ctx.tenant.as_ref().map(|t| t.tenant_id.as_str())
        );

        for ring in ObserverRing::ALL {
            if ring == ObserverRing::Database && ctx.skip_database {
                tracing::debug!("Database ring skipped for {}", ctx.resource);
                continue;
            }
            ctx.current_ring = Some(ring);
            self.execute_ring(ring, &mut ctx).await;

            if ctx.has_errors() {
                if ring == ObserverRing::PostDatabase {
                    for error in ctx.errors.drain(..) {
                        ctx.warnings.push(ObserverWarning::new("pipeline", ring as u8, error.to_string()));
                    }
                    continue;
                }
                tracing::warn!("Observer pipeline stopped at ring {:?} due to errors", ring);
                let mut errors = std::mem::take(&mut ctx.errors);
                return Err(errors.remove(0));
            }
        }

        tracing::debug!(
            "Observer pipeline finished: operation={:?}, resource={}, rows={}, elapsed={:?}",
            ctx.operation,
            ctx.resource,
            ctx.outcome_size(),
            ctx.execution_time()
        );
        Ok(ctx)
    }

    /// Execute observers in a specific ring, collecting errors into the context
    async fn execute_ring(&self, ring: ObserverRing, ctx: &mut ObserverContext) {
        let Some(observers) = self.observers.get(&ring) else {
            tracing::trace!("No observers registered for ring {:?}", ring);
            return;
        };

        for observer in observers {
            if !observer.applies_to_operation(ctx.operation) || !observer.applies_to_resource(&ctx.resource) {
                tracing::trace!("Observer {} skipped for {:?} on {}", observer.name(), ctx.operation, ctx.resource);
                continue;
            }

            let observer_start = Instant::now();
            let result = timeout(observer.timeout(), observer.execute(ctx)).await;
            let execution_time = observer_start.elapsed();

            match result {
                Ok(Ok(())) => {
                    tracing::trace!("Observer: {} completed in {:?}", observer.name(), execution_time);
                }
                Ok(Err(error)) => {
                    tracing::warn!("Observer: {} failed in {:?}: {}", observer.name(), execution_time, error);
                    ctx.errors.push(error);
                }
                Err(_elapsed) => {
                    tracing::error!("Observer: {} timed out after {:?}", observer.name(), observer.timeout());
                    ctx.errors.push(ObserverError::TimeoutError(format!(
                        "Observer {} timed out after {:?}",
                        observer.name(),
                        observer.timeout()
                    )));
                }
            }

            // Pre-database rings stop at the first failure
            if ctx.has_errors() && ring.is_pre_database() {
                return;
            }
        }
    }
}

impl Default for ObserverPipeline {
    fn default() -> Self {
        Self::new()
    }
}
