//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the logging subsystem
//! - Log every request once it completes, with its failure if any
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, pretty format for development
//! - Log filter configurable via config and environment (`RUST_LOG` wins)

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;
use crate::error::{Failure, HookResult};
use crate::pipeline::{MessageContext, MessageObserver};

/// Install the global subscriber. Calling it twice is an error.
pub fn init_logging(config: &ObservabilityConfig) -> Result<(), Failure> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))?;

    let registry = tracing_subscriber::registry().with(filter);
    if config.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).try_init()?;
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()?;
    }
    Ok(())
}

/// Logs request outcomes.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingObserver;

impl MessageObserver for LoggingObserver {
    fn on_complete(&self, context: &MessageContext) -> HookResult {
        let request = context.request();
        let latency_ms = context.elapsed().as_millis() as u64;
        match context.failure() {
            Some(failure) => tracing::info!(
                request_id = %request.id(),
                method = %request.method(),
                path = %request.path(),
                status = context.status().as_u16(),
                latency_ms,
                error = %failure,
                "Request completed with failure"
            ),
            None => tracing::info!(
                request_id = %request.id(),
                method = %request.method(),
                path = %request.path(),
                route = request.route_name().unwrap_or("-"),
                status = context.status().as_u16(),
                latency_ms,
                "Request completed"
            ),
        }
        Ok(())
    }
}
