//! REST request dispatch library.
//!
//! Routes HTTP requests to typed handlers through a fixed pipeline:
//! resolve, preprocess, invoke, postprocess, serialize, write, finally.

pub mod config;
pub mod echo;
pub mod error;
pub mod exception;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pipeline;
pub mod routing;
pub mod serialization;

pub use config::ServerConfig;
pub use error::{Failure, ServiceError, ServiceErrorKind};
pub use http::{HttpServer, Request, Response};
pub use lifecycle::Shutdown;
pub use pipeline::{Pipeline, PipelineBuilder};
pub use routing::{Controller, Handler, HandlerResult, RouteSpec, RouteTable};
