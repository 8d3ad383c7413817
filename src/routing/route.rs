//! Route definitions and handler capabilities.
//!
//! # Responsibilities
//! - Define the `Handler` capability invoked by the pipeline
//! - Describe registrations declaratively (`RouteSpec`)
//! - Hold the sealed, immutable `Route` used at dispatch time
//! - Expand a `Controller` into one route per HTTP method
//!
//! # Design Decisions
//! - Handlers are typed values, registered directly (no lookup by name)
//! - Closures are handlers, so small routes need no extra types
//! - A route's base URL only affects generated links, never matching

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use axum::http::Method;

use crate::error::{Failure, ServiceError};
use crate::http::{Body, Request, Response};
use crate::routing::pattern::{PatternError, UrlMatch, UrlPattern};

/// What a handler returns: an optional body replacing the response body.
pub type HandlerResult = Result<Option<Body>, Failure>;

/// The application logic bound to a route.
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, request: &mut Request, response: &mut Response) -> HandlerResult;
}

impl<F> Handler for F
where
    F: Fn(&mut Request, &mut Response) -> HandlerResult + Send + Sync + 'static,
{
    fn handle(&self, request: &mut Request, response: &mut Response) -> HandlerResult {
        self(request, response)
    }
}

/// A resource with CRUD-style actions.
///
/// Unimplemented actions answer 501.
pub trait Controller: Send + Sync + 'static {
    fn create(&self, request: &mut Request, _response: &mut Response) -> HandlerResult {
        Err(not_implemented(request))
    }

    fn read(&self, request: &mut Request, _response: &mut Response) -> HandlerResult {
        Err(not_implemented(request))
    }

    fn update(&self, request: &mut Request, _response: &mut Response) -> HandlerResult {
        Err(not_implemented(request))
    }

    fn delete(&self, request: &mut Request, _response: &mut Response) -> HandlerResult {
        Err(not_implemented(request))
    }
}

fn not_implemented(request: &Request) -> Failure {
    Box::new(ServiceError::not_implemented(format!(
        "{} {} is not implemented",
        request.method(),
        request.path()
    )))
}

/// Binds one controller action to a route.
struct ControllerAction {
    controller: Arc<dyn Controller>,
    method: Method,
}

impl Handler for ControllerAction {
    fn handle(&self, request: &mut Request, response: &mut Response) -> HandlerResult {
        match self.method {
            Method::POST => self.controller.create(request, response),
            Method::GET => self.controller.read(request, response),
            Method::PUT => self.controller.update(request, response),
            Method::DELETE => self.controller.delete(request, response),
            _ => Err(not_implemented(request)),
        }
    }
}

/// Register a controller under `template` for each method.
///
/// POST maps to `create`, GET to `read`, PUT to `update` and DELETE to
/// `delete`. Other methods answer 501.
pub fn uri(template: &str, controller: Arc<dyn Controller>, methods: &[Method]) -> Vec<RouteSpec> {
    methods
        .iter()
        .map(|method| {
            let action = ControllerAction {
                controller: Arc::clone(&controller),
                method: method.clone(),
            };
            RouteSpec::new(template, method.clone(), action)
        })
        .collect()
}

/// A declarative route registration.
#[derive(Clone)]
pub struct RouteSpec {
    pub(crate) template: String,
    pub(crate) method: Method,
    pub(crate) handler: Arc<dyn Handler>,
    pub(crate) name: Option<String>,
    pub(crate) supported_formats: Vec<String>,
    pub(crate) default_format: Option<String>,
    pub(crate) flags: HashSet<String>,
    pub(crate) parameters: HashMap<String, serde_json::Value>,
    pub(crate) base_url: Option<String>,
    pub(crate) serialize_response: bool,
}

impl RouteSpec {
    pub fn new(template: impl Into<String>, method: Method, handler: impl Handler) -> Self {
        Self::with_handler(template, method, Arc::new(handler))
    }

    /// Register an already shared handler.
    pub fn with_handler(template: impl Into<String>, method: Method, handler: Arc<dyn Handler>) -> Self {
        Self {
            template: template.into(),
            method,
            handler,
            name: None,
            supported_formats: Vec::new(),
            default_format: None,
            flags: HashSet::new(),
            parameters: HashMap::new(),
            base_url: None,
            serialize_response: true,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Restrict the formats this route answers in.
    pub fn supported_formats<I, S>(mut self, formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for format in formats {
            let format = format.into();
            if !self.supported_formats.contains(&format) {
                self.supported_formats.push(format);
            }
        }
        self
    }

    pub fn default_format(mut self, format: impl Into<String>) -> Self {
        self.default_format = Some(format.into());
        self
    }

    pub fn flag(mut self, flag: impl Into<String>) -> Self {
        self.flags.insert(flag.into());
        self
    }

    pub fn parameter(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Write handler results as-is instead of passing them to a serializer.
    pub fn no_serialization(mut self) -> Self {
        self.serialize_response = false;
        self
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn method(&self) -> &Method {
        &self.method
    }
}

impl fmt::Debug for RouteSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteSpec")
            .field("template", &self.template)
            .field("method", &self.method)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// A sealed route.
pub struct Route {
    pattern: UrlPattern,
    method: Method,
    handler: Arc<dyn Handler>,
    name: Option<String>,
    supported_formats: Vec<String>,
    default_format: Option<String>,
    flags: HashSet<String>,
    parameters: HashMap<String, serde_json::Value>,
    base_url: String,
    serialize_response: bool,
}

impl Route {
    pub(crate) fn from_spec(spec: RouteSpec) -> Result<Self, PatternError> {
        let pattern = UrlPattern::compile(&spec.template)?;
        let name = spec.name.filter(|n| !n.trim().is_empty());

        Ok(Self {
            pattern,
            method: spec.method,
            handler: spec.handler,
            name,
            supported_formats: spec.supported_formats,
            default_format: spec.default_format,
            flags: spec.flags,
            parameters: spec.parameters,
            base_url: spec.base_url.unwrap_or_default(),
            serialize_response: spec.serialize_response,
        })
    }

    pub fn pattern(&self) -> &UrlPattern {
        &self.pattern
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Base URL followed by the pattern, for building links.
    pub fn full_pattern(&self) -> String {
        format!("{}{}", self.base_url, self.pattern.pattern())
    }

    pub fn supported_formats(&self) -> &[String] {
        &self.supported_formats
    }

    /// Whether the route answers in `format`. Routes without a list accept all.
    pub fn supports_format(&self, format: &str) -> bool {
        self.supported_formats.is_empty() || self.supported_formats.iter().any(|f| f == format)
    }

    pub fn default_format(&self) -> Option<&str> {
        self.default_format.as_deref()
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.contains(flag)
    }

    pub fn parameter(&self, key: &str) -> Option<&serde_json::Value> {
        self.parameters.get(key)
    }

    pub fn should_serialize_response(&self) -> bool {
        self.serialize_response
    }

    pub fn matches(&self, path: &str) -> Option<UrlMatch> {
        self.pattern.matches(path)
    }

    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }

    pub fn invoke(&self, request: &mut Request, response: &mut Response) -> HandlerResult {
        self.handler.handle(request, response)
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("pattern", &self.pattern.template())
            .field("name", &self.name)
            .field("supported_formats", &self.supported_formats)
            .field("default_format", &self.default_format)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceErrorKind;
    use serde_json::json;

    struct Things;

    impl Controller for Things {
        fn read(&self, _request: &mut Request, _response: &mut Response) -> HandlerResult {
            Ok(Some(json!({"things": []}).into()))
        }
    }

    fn noop(_: &mut Request, _: &mut Response) -> HandlerResult {
        Ok(None)
    }

    fn request(method: Method) -> Request {
        Request::new(method, "/things".parse().unwrap())
    }

    #[test]
    fn test_closure_is_handler() {
        let spec = RouteSpec::new("/ping", Method::GET, |_: &mut Request, _: &mut Response| -> HandlerResult {
            Ok(Some(Body::from("pong")))
        });
        let route = Route::from_spec(spec).unwrap();
        let mut response = Response::new();
        let body = route.invoke(&mut request(Method::GET), &mut response).unwrap();
        assert_eq!(body, Some(Body::Text("pong".into())));
    }

    #[test]
    fn test_spec_setters_carry_into_route() {
        let spec = RouteSpec::new("/things/{id}.{format}", Method::GET, noop)
            .name("thing")
            .supported_formats(["json", "xml", "json"])
            .default_format("xml")
            .flag("cacheable")
            .parameter("ttl", 30)
            .base_url("http://localhost:10080")
            .no_serialization();
        let route = Route::from_spec(spec).unwrap();

        assert_eq!(route.name(), Some("thing"));
        assert_eq!(route.supported_formats(), ["json", "xml"]);
        assert!(route.supports_format("xml"));
        assert!(!route.supports_format("yaml"));
        assert_eq!(route.default_format(), Some("xml"));
        assert!(route.has_flag("cacheable"));
        assert!(!route.has_flag("secret"));
        assert_eq!(route.parameter("ttl"), Some(&json!(30)));
        assert_eq!(route.full_pattern(), "http://localhost:10080/things/{id}");
        assert!(!route.should_serialize_response());
    }

    #[test]
    fn test_blank_name_is_dropped() {
        let spec = RouteSpec::new("/a", Method::GET, noop).name("  ");
        assert_eq!(Route::from_spec(spec).unwrap().name(), None);
    }

    #[test]
    fn test_invalid_template_rejected() {
        let spec = RouteSpec::new("no-slash", Method::GET, noop);
        assert!(Route::from_spec(spec).is_err());
    }

    #[test]
    fn test_controller_uri_expansion() {
        let specs = uri("/things", Arc::new(Things), &[Method::GET, Method::POST]);
        assert_eq!(specs.len(), 2);

        let read = Route::from_spec(specs[0].clone()).unwrap();
        let mut response = Response::new();
        let body = read.invoke(&mut request(Method::GET), &mut response).unwrap();
        assert_eq!(body.unwrap().as_value().unwrap()["things"], json!([]));

        let create = Route::from_spec(specs[1].clone()).unwrap();
        let failure = create.invoke(&mut request(Method::POST), &mut response).unwrap_err();
        let error = failure.downcast_ref::<ServiceError>().unwrap();
        assert_eq!(error.kind(), ServiceErrorKind::NotImplemented);
    }
}
