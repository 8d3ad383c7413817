//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, body buffering, peer address)
//!     → request.rs (request ID, query parsing, body cursor)
//!     → [pipeline resolves, invokes, serializes]
//!     → response.rs (status, headers, body)
//!     → specification.rs (no content for 1xx/204/304)
//!     → writer.rs (Content-Length, connection semantics)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;
pub mod specification;
pub mod writer;

pub use request::{Request, RequestId, X_REQUEST_ID};
pub use response::{Body, Response, TEXT_PLAIN};
pub use server::{HttpServer, ServerError};
pub use writer::{DefaultResponseWriter, ResponseWriter, WireResponse};
