//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Pipeline produces:
//!     → logging.rs (structured log events, per-request completion log)
//!     → metrics.rs (counters, histograms via the metrics facade)
//!
//! Consumers:
//!     → Log aggregation (stdout, JSON lines)
//!     → Whatever metrics recorder the embedding process installs
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows through every log event
//! - Metrics are cheap and become no-ops without a recorder

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LoggingObserver};
