//! Handler execution off the I/O tasks.
//!
//! # Responsibilities
//! - Run handlers on tokio's blocking pool, bounded by a semaphore
//! - Enforce the handler timeout
//! - Turn handler panics into failures
//!
//! # Design Decisions
//! - The permit travels into the blocking task, so the bound counts running
//!   handlers even after a caller gave up waiting
//! - Request and response are cloned into the task and moved back on
//!   completion; on timeout the pre-invocation state is kept
//! - With no workers configured, handlers run inline and cannot be timed out

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use crate::config::schema::ExecutorConfig;
use crate::error::ServiceError;
use crate::pipeline::MessageContext;
use crate::routing::{HandlerResult, Route};

/// Where and how long handlers may run.
#[derive(Debug, Clone)]
pub struct HandlerWorkers {
    permits: Option<Arc<Semaphore>>,
    timeout: Option<Duration>,
}

impl HandlerWorkers {
    /// `worker_threads = 0` runs handlers inline on the calling task.
    pub fn new(worker_threads: usize, timeout: Option<Duration>) -> Self {
        let permits = (worker_threads > 0).then(|| Arc::new(Semaphore::new(worker_threads)));
        Self { permits, timeout }
    }

    /// Run handlers on the calling task.
    pub fn inline() -> Self {
        Self::new(0, None)
    }

    pub fn from_config(config: &ExecutorConfig) -> Self {
        let timeout = (config.handler_timeout_ms > 0)
            .then(|| Duration::from_millis(config.handler_timeout_ms));
        Self::new(config.worker_threads, timeout)
    }

    pub fn is_inline(&self) -> bool {
        self.permits.is_none()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Handler slots not currently taken.
    pub fn available(&self) -> Option<usize> {
        self.permits.as_ref().map(|p| p.available_permits())
    }

    /// Invoke the route's handler against the context's request and response.
    pub async fn invoke(&self, route: &Arc<Route>, context: &mut MessageContext) -> HandlerResult {
        let Some(permits) = &self.permits else {
            let (request, response) = context.parts_mut();
            return catch_unwind(AssertUnwindSafe(|| route.invoke(request, response)))
                .unwrap_or_else(|panic| Err(panicked(route, panic)));
        };

        let mut request = context.request().clone();
        let mut response = context.response().clone();
        let route_for_task = Arc::clone(route);
        let permits = Arc::clone(permits);

        let task = async move {
            let permit = permits
                .acquire_owned()
                .await
                .map_err(|_| ServiceError::service_unavailable("Handler workers are shut down"))?;

            tokio::task::spawn_blocking(move || {
                let _permit = permit;
                let result = catch_unwind(AssertUnwindSafe(|| {
                    route_for_task.invoke(&mut request, &mut response)
                }))
                .unwrap_or_else(|panic| Err(panicked(&route_for_task, panic)));
                (request, response, result)
            })
            .await
            .map_err(|e| ServiceError::internal("Handler task failed").with_source(e))
        };

        let outcome = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, task).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    tracing::warn!(
                        request_id = %context.request().id(),
                        route = %route.pattern(),
                        timeout_ms = limit.as_millis() as u64,
                        "Handler timed out"
                    );
                    return Err(Box::new(ServiceError::service_unavailable(format!(
                        "Handler did not complete within {} ms",
                        limit.as_millis()
                    ))));
                }
            },
            None => task.await,
        };

        match outcome {
            Ok((request, response, result)) => {
                context.replace_parts(request, response);
                result
            }
            Err(error) => Err(Box::new(error)),
        }
    }
}

impl Default for HandlerWorkers {
    fn default() -> Self {
        Self::from_config(&ExecutorConfig::default())
    }
}

fn panicked(route: &Route, panic: Box<dyn Any + Send>) -> crate::error::Failure {
    let message = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    tracing::error!(route = %route.pattern(), panic = %message, "Handler panicked");
    Box::new(ServiceError::internal("Handler panicked"))
}
