//! Inbound request model.
//!
//! # Responsibilities
//! - Normalize a transport request (method, path, headers, query, body)
//! - Assign a unique request ID for tracing
//! - Carry URL parameters and the format token once a route is resolved
//! - Offer a typed extension slot for data handed from hooks to handlers
//!
//! # Design Decisions
//! - Body is fully buffered (`Bytes`) behind a read cursor that the
//!   pipeline rewinds after preprocessing
//! - Query parameters keep every value in arrival order
//! - Keep-alive follows HTTP/1.0 vs HTTP/1.1 defaults

use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::net::SocketAddr;

use axum::body::Bytes;
use axum::http::{header, request::Parts, Extensions, HeaderMap, HeaderName, HeaderValue, Method, Uri, Version};
use uuid::Uuid;

use crate::routing::UrlMatch;

/// Header carrying the request ID, accepted from the client when present.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Unique identifier for a request, used to correlate log events.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    /// Generate a new random request ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A normalized HTTP request as seen by hooks and handlers.
#[derive(Debug, Clone)]
pub struct Request {
    id: RequestId,
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    query: Vec<(String, String)>,
    body: Cursor<Bytes>,
    remote_addr: Option<SocketAddr>,
    url_params: HashMap<String, String>,
    format: Option<String>,
    route_name: Option<String>,
    extensions: Extensions,
}

impl Request {
    /// Create a request with an empty body, e.g. for tests or embedders.
    pub fn new(method: Method, uri: Uri) -> Self {
        let query = parse_query(&uri);
        Self {
            id: RequestId::new(),
            method,
            uri,
            version: Version::HTTP_11,
            headers: HeaderMap::new(),
            query,
            body: Cursor::new(Bytes::new()),
            remote_addr: None,
            url_params: HashMap::new(),
            format: None,
            route_name: None,
            extensions: Extensions::new(),
        }
    }

    /// Build a request from transport parts and a buffered body.
    ///
    /// A client-supplied `X-Request-ID` is reused so IDs flow across hops.
    pub fn from_parts(parts: Parts, body: Bytes, remote_addr: Option<SocketAddr>) -> Self {
        let id = parts
            .headers
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(|v| RequestId(v.to_string()))
            .unwrap_or_default();
        let query = parse_query(&parts.uri);

        Self {
            id,
            method: parts.method,
            uri: parts.uri,
            version: parts.version,
            headers: parts.headers,
            query,
            body: Cursor::new(body),
            remote_addr,
            url_params: HashMap::new(),
            format: None,
            route_name: None,
            extensions: parts.extensions,
        }
    }

    /// Builder-style header insertion.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Builder-style body replacement.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Cursor::new(body.into());
        self
    }

    pub fn with_version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    pub fn id(&self) -> &RequestId {
        &self.id
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// First value of a header, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// All values of a header in arrival order.
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect()
    }

    /// First decoded value of a query parameter.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Every decoded value of a query parameter.
    pub fn query_params(&self, name: &str) -> Vec<&str> {
        self.query
            .iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Value of a URL parameter bound by the matched route.
    pub fn url_param(&self, name: &str) -> Option<&str> {
        self.url_params.get(name).map(String::as_str)
    }

    pub fn url_params(&self) -> &HashMap<String, String> {
        &self.url_params
    }

    /// Format token taken from the path suffix, e.g. `json` for `/items.json`.
    pub fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }

    /// Name of the matched route, if it has one.
    pub fn route_name(&self) -> Option<&str> {
        self.route_name.as_deref()
    }

    pub(crate) fn apply_match(&mut self, url_match: &UrlMatch, route_name: Option<&str>) {
        self.url_params = url_match.params().clone();
        self.format = url_match.format().map(str::to_string);
        self.route_name = route_name.map(str::to_string);
    }

    /// Whole request body, independent of the read cursor.
    pub fn body(&self) -> &Bytes {
        self.body.get_ref()
    }

    pub fn has_body(&self) -> bool {
        !self.body.get_ref().is_empty()
    }

    /// Body bytes not yet consumed through [`Read`].
    pub fn remaining_body(&self) -> &[u8] {
        let position = (self.body.position() as usize).min(self.body.get_ref().len());
        &self.body.get_ref()[position..]
    }

    /// Rewind the body cursor so the next reader sees the body from its start.
    pub fn reset_body(&mut self) {
        self.body.set_position(0);
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    /// Whether the connection should stay open after the response.
    pub fn is_keep_alive(&self) -> bool {
        let connection = self
            .headers
            .get_all(header::CONNECTION)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .map(|token| token.trim().to_ascii_lowercase())
            .collect::<Vec<_>>();

        if connection.iter().any(|t| t == "close") {
            return false;
        }
        match self.version {
            Version::HTTP_09 | Version::HTTP_10 => connection.iter().any(|t| t == "keep-alive"),
            _ => true,
        }
    }
}

impl Read for Request {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.body.read(buf)
    }
}

fn parse_query(uri: &Uri) -> Vec<(String, String)> {
    uri.query()
        .map(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(uri: &str) -> Request {
        Request::new(Method::GET, uri.parse().unwrap())
    }

    #[test]
    fn test_query_params_keep_order_and_decode() {
        let req = request("/test?echo=hi%20there&tag=a&tag=b");
        assert_eq!(req.query_param("echo"), Some("hi there"));
        assert_eq!(req.query_params("tag"), vec!["a", "b"]);
        assert_eq!(req.query_param("missing"), None);
    }

    #[test]
    fn test_body_cursor_reset() {
        let mut req = request("/upload").with_body("hello");
        let mut buf = [0u8; 3];
        req.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hel");
        assert_eq!(req.remaining_body(), b"lo");

        req.reset_body();
        assert_eq!(req.remaining_body(), b"hello");
        assert_eq!(req.body().as_ref(), b"hello");
    }

    #[test]
    fn test_keep_alive_defaults() {
        let req = request("/");
        assert!(req.is_keep_alive());

        let req = request("/").with_header(header::CONNECTION, HeaderValue::from_static("close"));
        assert!(!req.is_keep_alive());

        let req = request("/").with_version(Version::HTTP_10);
        assert!(!req.is_keep_alive());

        let req = request("/")
            .with_version(Version::HTTP_10)
            .with_header(header::CONNECTION, HeaderValue::from_static("Keep-Alive"));
        assert!(req.is_keep_alive());
    }

    #[test]
    fn test_request_id_reused_from_header() {
        let (parts, _) = axum::http::Request::builder()
            .uri("/test")
            .header(X_REQUEST_ID, "abc-123")
            .body(())
            .unwrap()
            .into_parts();
        let req = Request::from_parts(parts, Bytes::new(), None);
        assert_eq!(req.id().as_str(), "abc-123");

        let other = request("/test");
        assert_ne!(other.id(), req.id());
    }
}
