//! Content negotiation.
//!
//! # Responsibilities
//! - Pick the response format for a request
//! - Enforce a route's supported-format list
//! - Pin the result on the request context
//!
//! # Design Decisions
//! - Precedence: path suffix, then `?format=`, then Accept, then the
//!   route default, then the provider default
//! - An Accept match that only comes from `*/*` states no preference
//! - A default the Accept header rules out with `q=0` is skipped
//! - Forcing the default never fails while any serializer is registered;
//!   the failure path relies on it to render error bodies

use std::sync::Arc;

use crate::error::ServiceError;
use crate::http::Request;
use crate::pipeline::MessageContext;
use crate::routing::Route;
use crate::serialization::{essence, SerializationProvider, SerializationSettings};

/// Query parameter naming the desired format.
pub const FORMAT_PARAM: &str = "format";

/// Resolves serialization settings for requests.
#[derive(Debug, Clone)]
pub struct ContentNegotiator {
    provider: Arc<SerializationProvider>,
}

impl ContentNegotiator {
    pub fn new(provider: Arc<SerializationProvider>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &Arc<SerializationProvider> {
        &self.provider
    }

    /// Negotiate once per context; later calls return the pinned settings.
    pub fn resolve_for(
        &self,
        context: &mut MessageContext,
        force_default: bool,
    ) -> Result<SerializationSettings, ServiceError> {
        if let Some(settings) = context.serialization_settings() {
            return Ok(settings.clone());
        }

        let route = context.action().map(|a| Arc::clone(a.route()));
        let settings = self.resolve(context.request(), route.as_deref(), force_default)?;
        context.set_serialization_settings(settings.clone());
        Ok(settings)
    }

    /// Negotiate settings for a request without pinning them.
    pub fn resolve(
        &self,
        request: &Request,
        route: Option<&Route>,
        force_default: bool,
    ) -> Result<SerializationSettings, ServiceError> {
        let requested = request
            .format()
            .or_else(|| request.query_param(FORMAT_PARAM))
            .filter(|f| !f.is_empty());

        if let Some(format) = requested {
            let Some(settings) = self.provider.for_format(format) else {
                if force_default {
                    return self.fallback(route);
                }
                return Err(ServiceError::not_acceptable(format!(
                    "Requested representation format not supported: {}",
                    format
                )));
            };
            let allowed = route.map(|r| r.supports_format(format)).unwrap_or(true);
            return self.restrict(settings, allowed, route, force_default);
        }

        let ranges = request
            .header(axum::http::header::ACCEPT.as_str())
            .map(parse_accept)
            .unwrap_or_default();

        if let Some(settings) = self.from_accept(&ranges) {
            let allowed = match route {
                Some(r) => settings.serializer().formats().iter().any(|f| r.supports_format(f)),
                None => true,
            };
            return self.restrict(settings, allowed, route, force_default);
        }

        let settings = self.fallback(route)?;
        if force_default || !excludes(&ranges, settings.media_type()) {
            return Ok(settings);
        }
        self.first_acceptable(&ranges, route).ok_or_else(|| {
            ServiceError::not_acceptable(format!(
                "Default format {} is excluded by the Accept header",
                settings.format().unwrap_or(settings.media_type())
            ))
        })
    }

    fn restrict(
        &self,
        settings: SerializationSettings,
        allowed: bool,
        route: Option<&Route>,
        force_default: bool,
    ) -> Result<SerializationSettings, ServiceError> {
        if allowed {
            return Ok(settings);
        }
        if force_default {
            return self.fallback(route);
        }
        let supported = route
            .map(|r| r.supported_formats().join(", "))
            .unwrap_or_default();
        Err(ServiceError::not_acceptable(format!(
            "Format {} is not supported here (supported: {})",
            settings.format().unwrap_or(settings.media_type()),
            supported
        )))
    }

    /// Route default, else the provider default.
    fn fallback(&self, route: Option<&Route>) -> Result<SerializationSettings, ServiceError> {
        if let Some(format) = route.and_then(Route::default_format) {
            match self.provider.for_format(format) {
                Some(settings) => return Ok(settings),
                None => tracing::warn!(format = %format, "Route default format has no serializer"),
            }
        }
        self.provider
            .default_settings()
            .ok_or_else(|| ServiceError::not_acceptable("No serializer is registered"))
    }

    /// Best registered media type for an Accept header.
    fn from_accept(&self, ranges: &[MediaRange]) -> Option<SerializationSettings> {
        if ranges.is_empty() {
            return None;
        }

        let mut best: Option<(f32, bool, SerializationSettings)> = None;
        for (media_type, serializer) in self.provider.media_types() {
            let Some(range) = best_range(ranges, media_type) else {
                continue;
            };
            if range.q <= 0.0 {
                continue;
            }
            let better = best.as_ref().map(|(q, _, _)| range.q > *q).unwrap_or(true);
            if better {
                let settings = SerializationSettings::new(media_type, Arc::clone(serializer));
                best = Some((range.q, range.is_any(), settings));
            }
        }

        match best {
            Some((_, false, settings)) => Some(settings),
            _ => None,
        }
    }

    /// First registered media type the Accept header allows, skipping
    /// serializers whose primary media type it rules out.
    fn first_acceptable(&self, ranges: &[MediaRange], route: Option<&Route>) -> Option<SerializationSettings> {
        self.provider
            .media_types()
            .filter(|(_, serializer)| match route {
                Some(r) => serializer.formats().iter().any(|f| r.supports_format(f)),
                None => true,
            })
            .filter(|(_, serializer)| {
                serializer
                    .media_types()
                    .first()
                    .map_or(true, |primary| !excludes(ranges, primary))
            })
            .find(|(media_type, _)| best_range(ranges, media_type).is_some_and(|r| r.q > 0.0))
            .map(|(media_type, serializer)| SerializationSettings::new(media_type, Arc::clone(serializer)))
    }
}

fn parse_accept(accept: &str) -> Vec<MediaRange> {
    accept.split(',').filter_map(MediaRange::parse).collect()
}

/// The most specific range covering `media_type`.
fn best_range<'a>(ranges: &'a [MediaRange], media_type: &str) -> Option<&'a MediaRange> {
    let wanted = essence(media_type);
    ranges
        .iter()
        .filter(|r| r.matches(&wanted))
        .max_by_key(|r| r.specificity())
}

/// Whether the client ruled `media_type` out with `q=0`.
fn excludes(ranges: &[MediaRange], media_type: &str) -> bool {
    best_range(ranges, media_type).is_some_and(|r| r.q <= 0.0)
}

/// One entry of an Accept header.
#[derive(Debug, Clone, PartialEq)]
struct MediaRange {
    kind: String,
    subtype: String,
    q: f32,
}

impl MediaRange {
    fn parse(text: &str) -> Option<Self> {
        let mut parts = text.split(';');
        let (kind, subtype) = parts.next()?.trim().split_once('/')?;
        let (kind, subtype) = (kind.trim().to_ascii_lowercase(), subtype.trim().to_ascii_lowercase());
        if kind.is_empty() || subtype.is_empty() {
            return None;
        }

        let mut q = 1.0;
        for param in parts {
            if let Some((name, value)) = param.split_once('=') {
                if name.trim().eq_ignore_ascii_case("q") {
                    q = value.trim().parse::<f32>().ok()?.clamp(0.0, 1.0);
                }
            }
        }
        Some(Self { kind, subtype, q })
    }

    fn matches(&self, essence: &str) -> bool {
        let Some((kind, subtype)) = essence.split_once('/') else {
            return false;
        };
        (self.kind == "*" || self.kind == kind) && (self.subtype == "*" || self.subtype == subtype)
    }

    fn specificity(&self) -> u8 {
        match (self.kind.as_str(), self.subtype.as_str()) {
            ("*", _) => 0,
            (_, "*") => 1,
            _ => 2,
        }
    }

    fn is_any(&self) -> bool {
        self.kind == "*"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceErrorKind;
    use crate::http::Response;
    use crate::routing::{HandlerResult, RouteSpec};
    use crate::serialization::{JSON, XML};
    use axum::http::{header, HeaderValue, Method};

    fn noop(_: &mut Request, _: &mut Response) -> HandlerResult {
        Ok(None)
    }

    fn negotiator() -> ContentNegotiator {
        ContentNegotiator::new(Arc::new(SerializationProvider::with_defaults()))
    }

    fn request(uri: &str, format: Option<&str>, accept: Option<&'static str>) -> Request {
        let mut request = Request::new(Method::GET, uri.parse().unwrap());
        if let Some(accept) = accept {
            request = request.with_header(header::ACCEPT, HeaderValue::from_static(accept));
        }
        if let Some(format) = format {
            let pattern = crate::routing::UrlPattern::compile("/test").unwrap();
            let url_match = pattern.matches(&format!("/test.{}", format)).unwrap();
            request.apply_match(&url_match, None);
        }
        request
    }

    fn route(spec: RouteSpec) -> Route {
        Route::from_spec(spec).unwrap()
    }

    #[test]
    fn test_suffix_beats_query_beats_accept() {
        let n = negotiator();
        let req = request("/test.xml?format=json", Some("xml"), Some("text/plain"));
        assert_eq!(n.resolve(&req, None, false).unwrap().format(), Some(XML));

        let req = request("/test?format=xml", None, Some("application/json"));
        assert_eq!(n.resolve(&req, None, false).unwrap().format(), Some(XML));

        let req = request("/test", None, Some("text/xml"));
        let settings = n.resolve(&req, None, false).unwrap();
        assert_eq!(settings.format(), Some(XML));
        assert_eq!(settings.media_type(), "text/xml; charset=UTF-8");
    }

    #[test]
    fn test_accept_q_values_and_wildcards() {
        let n = negotiator();
        let req = request("/test", None, Some("application/json;q=0.4, application/xml;q=0.9"));
        assert_eq!(n.resolve(&req, None, false).unwrap().format(), Some(XML));

        let req = request("/test", None, Some("application/*"));
        assert_eq!(n.resolve(&req, None, false).unwrap().format(), Some(JSON));

        let req = request("/test", None, Some("application/json;q=0, */*"));
        let xml_route = route(RouteSpec::new("/test", Method::GET, noop).default_format("xml"));
        assert_eq!(n.resolve(&req, Some(&xml_route), false).unwrap().format(), Some(XML));

        let req = request("/test", None, Some("text/html"));
        assert_eq!(n.resolve(&req, None, false).unwrap().format(), Some(JSON));
    }

    #[test]
    fn test_excluded_default_is_skipped() {
        let n = negotiator();
        let req = request("/test", None, Some("application/json;q=0, */*"));
        let settings = n.resolve(&req, None, false).unwrap();
        assert_eq!(settings.format(), Some(XML));
        assert_eq!(settings.media_type(), "application/xml; charset=UTF-8");

        let json_only = route(RouteSpec::new("/test", Method::GET, noop).supported_formats([JSON]));
        let error = n.resolve(&req, Some(&json_only), false).unwrap_err();
        assert_eq!(error.kind(), ServiceErrorKind::NotAcceptable);
        assert_eq!(n.resolve(&req, Some(&json_only), true).unwrap().format(), Some(JSON));
    }

    #[test]
    fn test_route_default_then_process_default() {
        let n = negotiator();
        let xml_route = route(RouteSpec::new("/test", Method::GET, noop).default_format("xml"));
        let req = request("/test", None, None);
        assert_eq!(n.resolve(&req, Some(&xml_route), false).unwrap().format(), Some(XML));
        assert_eq!(n.resolve(&req, None, false).unwrap().format(), Some(JSON));
    }

    #[test]
    fn test_unknown_format_not_acceptable_unless_forced() {
        let n = negotiator();
        let req = request("/test?format=yaml", None, None);
        let error = n.resolve(&req, None, false).unwrap_err();
        assert_eq!(error.kind(), ServiceErrorKind::NotAcceptable);
        assert_eq!(n.resolve(&req, None, true).unwrap().format(), Some(JSON));
    }

    #[test]
    fn test_route_restriction() {
        let n = negotiator();
        let json_only = route(
            RouteSpec::new("/test", Method::GET, noop)
                .supported_formats([JSON])
                .default_format(JSON),
        );

        let req = request("/test.xml", Some("xml"), None);
        let error = n.resolve(&req, Some(&json_only), false).unwrap_err();
        assert_eq!(error.kind(), ServiceErrorKind::NotAcceptable);
        assert_eq!(n.resolve(&req, Some(&json_only), true).unwrap().format(), Some(JSON));

        let req = request("/test", None, Some("application/xml"));
        assert!(n.resolve(&req, Some(&json_only), false).is_err());
    }

    #[test]
    fn test_resolve_for_is_idempotent() {
        let n = negotiator();
        let mut context = MessageContext::new(request("/test?format=xml", None, None));
        let first = n.resolve_for(&mut context, false).unwrap();

        context.request_mut().headers_mut().insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        let second = n.resolve_for(&mut context, false).unwrap();
        assert_eq!(first, second);
        assert_eq!(second.format(), Some(XML));
    }

    #[test]
    fn test_media_range_parse() {
        let range = MediaRange::parse(" Text/HTML ; level=1; q=0.5").unwrap();
        assert_eq!(range.kind, "text");
        assert_eq!(range.subtype, "html");
        assert_eq!(range.q, 0.5);
        assert!(MediaRange::parse("garbage").is_none());
        assert!(MediaRange::parse("a/b;q=nope").is_none());
    }
}
