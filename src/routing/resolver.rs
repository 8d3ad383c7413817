//! Route resolution.
//!
//! # Responsibilities
//! - Find the route for a `(method, path)` pair
//! - Tell "wrong method" (405) apart from "no such path" (404)
//!
//! # Design Decisions
//! - Lock-free: the table is immutable and shared
//! - Allowed methods are reported in table registration order

use std::sync::Arc;

use axum::http::Method;

use crate::error::ServiceError;
use crate::http::Request;
use crate::routing::pattern::UrlMatch;
use crate::routing::route::Route;
use crate::routing::table::RouteTable;

/// A resolved route with the match that selected it.
#[derive(Debug, Clone)]
pub struct Action {
    route: Arc<Route>,
    url_match: UrlMatch,
}

impl Action {
    pub fn route(&self) -> &Arc<Route> {
        &self.route
    }

    pub fn url_match(&self) -> &UrlMatch {
        &self.url_match
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.url_match.param(name)
    }

    pub fn format(&self) -> Option<&str> {
        self.url_match.format()
    }
}

/// Resolves requests against a route table.
#[derive(Debug, Clone)]
pub struct RouteResolver {
    table: Arc<RouteTable>,
}

impl RouteResolver {
    pub fn new(table: Arc<RouteTable>) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &Arc<RouteTable> {
        &self.table
    }

    /// First route registered for `method` whose pattern matches `path`.
    pub fn resolve(&self, method: &Method, path: &str) -> Result<Action, ServiceError> {
        for route in self.table.routes_for(method) {
            if let Some(url_match) = route.matches(path) {
                return Ok(Action {
                    route: Arc::clone(route),
                    url_match,
                });
            }
        }

        let allowed = self.allowed_methods(path);
        if allowed.is_empty() {
            Err(ServiceError::not_found(format!(
                "Unresolvable URL: {} {}",
                method, path
            )))
        } else {
            Err(ServiceError::method_not_allowed(method, path, &allowed))
        }
    }

    pub fn resolve_request(&self, request: &Request) -> Result<Action, ServiceError> {
        self.resolve(request.method(), request.path())
    }

    /// Methods with a route matching `path`.
    pub fn allowed_methods(&self, path: &str) -> Vec<Method> {
        self.table
            .methods()
            .iter()
            .filter(|method| {
                self.table
                    .routes_for(method)
                    .iter()
                    .any(|route| route.matches(path).is_some())
            })
            .cloned()
            .collect()
    }
}
