//! The sealed route table.
//!
//! # Responsibilities
//! - Collect route registrations in order and apply defaults
//! - Reject duplicate registrations and duplicate names
//! - Index routes by method (registration order kept) and by name
//!
//! # Design Decisions
//! - Built once, never mutated; shared as `Arc<RouteTable>`
//! - First registered wins when several patterns match a path
//! - Fully shadowed routes are accepted but logged, since they can never match

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::Method;
use thiserror::Error;

use crate::routing::pattern::PatternError;
use crate::routing::route::{Route, RouteSpec};

/// Errors raised while sealing a route table.
#[derive(Debug, Error)]
pub enum RouteTableError {
    #[error("invalid route {method} {template}: {source}")]
    Pattern {
        method: Method,
        template: String,
        #[source]
        source: PatternError,
    },

    #[error("route {method} {template} duplicates {existing}")]
    DuplicateRoute {
        method: Method,
        template: String,
        existing: String,
    },

    #[error("route name '{0}' is registered more than once")]
    DuplicateName(String),
}

/// Values applied to registrations that leave them unset.
#[derive(Debug, Clone, Default)]
pub struct RouteDefaults {
    pub base_url: Option<String>,
    pub default_format: Option<String>,
    pub supported_formats: Vec<String>,
}

impl RouteDefaults {
    fn apply(&self, mut spec: RouteSpec) -> RouteSpec {
        if spec.base_url.is_none() {
            spec.base_url = self.base_url.clone();
        }
        if spec.default_format.is_none() {
            spec.default_format = self.default_format.clone();
        }
        if spec.supported_formats.is_empty() {
            spec.supported_formats = self.supported_formats.clone();
        }
        spec
    }
}

/// Collects registrations until the table is sealed.
#[derive(Debug, Default)]
pub struct RouteTableBuilder {
    specs: Vec<RouteSpec>,
    defaults: RouteDefaults,
}

impl RouteTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn defaults(mut self, defaults: RouteDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn register(mut self, spec: RouteSpec) -> Self {
        self.specs.push(spec);
        self
    }

    pub fn register_all(mut self, specs: impl IntoIterator<Item = RouteSpec>) -> Self {
        self.specs.extend(specs);
        self
    }

    /// Compile every registration and seal the table.
    pub fn build(self) -> Result<RouteTable, RouteTableError> {
        let mut table = RouteTable::default();

        for spec in self.specs {
            let spec = self.defaults.apply(spec);
            let method = spec.method.clone();
            let template = spec.template.clone();
            let route = Route::from_spec(spec).map_err(|source| RouteTableError::Pattern {
                method: method.clone(),
                template: template.clone(),
                source,
            })?;

            let same_method = table.by_method.get(&method).map(Vec::as_slice).unwrap_or_default();
            if let Some(existing) = same_method
                .iter()
                .find(|r| r.pattern().same_shape(route.pattern()))
            {
                return Err(RouteTableError::DuplicateRoute {
                    method,
                    template,
                    existing: existing.pattern().template().to_string(),
                });
            }
            if let Some(shadow) = same_method
                .iter()
                .find(|r| route.pattern().is_shadowed_by(r.pattern()))
            {
                tracing::warn!(
                    method = %method,
                    route = %template,
                    shadowed_by = %shadow.pattern(),
                    "Route can never match, an earlier route covers every path"
                );
            }

            if let Some(name) = route.name() {
                if table.by_name.contains_key(name) {
                    return Err(RouteTableError::DuplicateName(name.to_string()));
                }
                table.by_name.insert(name.to_string(), table.routes.len());
            }

            let route = Arc::new(route);
            if !table.methods.contains(&method) {
                table.methods.push(method.clone());
            }
            table.by_method.entry(method).or_default().push(Arc::clone(&route));
            table.routes.push(route);
        }

        tracing::debug!(routes = table.routes.len(), "Route table sealed");
        Ok(table)
    }
}

/// Immutable routes indexed by method and name.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<Arc<Route>>,
    by_method: HashMap<Method, Vec<Arc<Route>>>,
    by_name: HashMap<String, usize>,
    methods: Vec<Method>,
}

impl RouteTable {
    pub fn builder() -> RouteTableBuilder {
        RouteTableBuilder::new()
    }

    /// Routes for a method, in registration order.
    pub fn routes_for(&self, method: &Method) -> &[Arc<Route>] {
        self.by_method.get(method).map(Vec::as_slice).unwrap_or_default()
    }

    /// Every route, in registration order.
    pub fn routes(&self) -> &[Arc<Route>] {
        &self.routes
    }

    /// Methods with at least one route, in order of first registration.
    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    pub fn named(&self, name: &str) -> Option<&Arc<Route>> {
        self.by_name.get(name).map(|&index| &self.routes[index])
    }

    /// Full pattern (base URL included) of a named route.
    pub fn url_pattern_for(&self, name: &str) -> Option<String> {
        self.named(name).map(|route| route.full_pattern())
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Request, Response};
    use crate::routing::route::HandlerResult;

    fn noop(_: &mut Request, _: &mut Response) -> HandlerResult {
        Ok(None)
    }

    fn spec(template: &str, method: Method) -> RouteSpec {
        RouteSpec::new(template, method, noop)
    }

    #[test]
    fn test_registration_order_preserved() {
        let table = RouteTable::builder()
            .register(spec("/items/{id}", Method::GET))
            .register(spec("/items/new", Method::GET))
            .register(spec("/items/{id}", Method::PUT))
            .build()
            .unwrap();

        let gets = table.routes_for(&Method::GET);
        assert_eq!(gets.len(), 2);
        assert_eq!(gets[0].pattern().template(), "/items/{id}");
        assert_eq!(gets[1].pattern().template(), "/items/new");
        assert_eq!(table.methods(), [Method::GET, Method::PUT]);
        assert!(table.routes_for(&Method::DELETE).is_empty());
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_duplicate_route_rejected() {
        let result = RouteTable::builder()
            .register(spec("/items/{id}", Method::GET))
            .register(spec("/items/{other}", Method::GET))
            .build();
        assert!(matches!(result, Err(RouteTableError::DuplicateRoute { .. })));

        let ok = RouteTable::builder()
            .register(spec("/items/{id}", Method::GET))
            .register(spec("/items/{id}", Method::POST))
            .build();
        assert!(ok.is_ok());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let result = RouteTable::builder()
            .register(spec("/a", Method::GET).name("same"))
            .register(spec("/b", Method::GET).name("same"))
            .build();
        assert!(matches!(result, Err(RouteTableError::DuplicateName(name)) if name == "same"));
    }

    #[test]
    fn test_invalid_template_reported() {
        let result = RouteTable::builder().register(spec("/a/{", Method::GET)).build();
        assert!(matches!(result, Err(RouteTableError::Pattern { .. })));
    }

    #[test]
    fn test_defaults_fill_unset_fields() {
        let defaults = RouteDefaults {
            base_url: Some("http://api.local".into()),
            default_format: Some("xml".into()),
            supported_formats: vec!["json".into(), "xml".into()],
        };
        let table = RouteTable::builder()
            .defaults(defaults)
            .register(spec("/a", Method::GET).name("a"))
            .register(spec("/b", Method::GET).default_format("json").supported_formats(["json"]))
            .build()
            .unwrap();

        let a = table.named("a").unwrap();
        assert_eq!(a.default_format(), Some("xml"));
        assert_eq!(a.supported_formats(), ["json", "xml"]);
        assert_eq!(table.url_pattern_for("a").as_deref(), Some("http://api.local/a"));

        let b = &table.routes()[1];
        assert_eq!(b.default_format(), Some("json"));
        assert_eq!(b.supported_formats(), ["json"]);
        assert!(table.named("missing").is_none());
    }
}
