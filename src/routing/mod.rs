//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route registration (at startup):
//!     RouteSpec[] (+ RouteDefaults)
//!     → pattern.rs (compile URL templates)
//!     → table.rs (check duplicates, index by method and name)
//!     → Freeze as immutable RouteTable
//!
//! Incoming Request (method, path)
//!     → resolver.rs (routes for method, in registration order)
//!     → pattern.rs (segment match, parameters, format suffix)
//!     → Return: Action, or 405 / 404
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (segment comparison only)
//! - Deterministic: first registered match wins

pub mod pattern;
pub mod resolver;
pub mod route;
pub mod table;

pub use pattern::{PatternError, UrlMatch, UrlPattern};
pub use resolver::{Action, RouteResolver};
pub use route::{uri, Controller, Handler, HandlerResult, Route, RouteSpec};
pub use table::{RouteDefaults, RouteTable, RouteTableBuilder, RouteTableError};
