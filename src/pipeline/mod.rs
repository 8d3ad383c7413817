//! Request pipeline.
//!
//! # Data Flow
//! ```text
//! Request
//!     → resolve route (404 / 405)        Received → Resolved
//!     → negotiate format (406)
//!     → preprocessors, rewind body       → Preprocessed
//!     → handler on worker pool (503)     → Invoked
//!     → postprocessors                   → Postprocessed
//!     → serialize, enforce HTTP rules    → Serialized
//!     → write                            → Written
//!     → finally hooks                    → Completed
//!
//! Any failure before serialization:
//!     → translate onto response          → Excepted → Serialized → ...
//! ```

pub mod context;
pub mod executor;
pub mod hooks;
pub mod worker;

pub use context::{MessageContext, PipelineState};
pub use executor::{Pipeline, PipelineBuilder};
pub use hooks::{MessageObserver, Postprocessor, Preprocessor};
pub use worker::HandlerWorkers;
