//! Outbound response model.
//!
//! # Responsibilities
//! - Hold status, headers and body while the pipeline shapes the response
//! - Distinguish serializable bodies from pre-rendered text or bytes
//!
//! # Design Decisions
//! - Handlers return structured values; the negotiated serializer renders them
//! - Rendering is skipped for routes that opt out of serialization

use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::Serialize;

/// Content type used when nothing more specific was negotiated.
pub const TEXT_PLAIN: &str = "text/plain; charset=UTF-8";

/// A response body.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Body {
    #[default]
    Empty,
    /// A structured value awaiting serialization.
    Value(serde_json::Value),
    /// Already rendered text.
    Text(String),
    /// Raw bytes, written as-is.
    Bytes(Bytes),
}

impl Body {
    /// Capture any serializable value as a structured body.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(value).map(Body::Value)
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Body::Empty => true,
            Body::Value(_) => false,
            Body::Text(text) => text.is_empty(),
            Body::Bytes(bytes) => bytes.is_empty(),
        }
    }

    /// Whether a serializer can render this body.
    pub fn is_serializable(&self) -> bool {
        matches!(self, Body::Value(_))
    }

    pub fn as_value(&self) -> Option<&serde_json::Value> {
        match self {
            Body::Value(value) => Some(value),
            _ => None,
        }
    }

    /// Bytes as written to the wire.
    pub fn to_bytes(&self) -> Bytes {
        match self {
            Body::Empty => Bytes::new(),
            Body::Value(value) => Bytes::from(value.to_string()),
            Body::Text(text) => Bytes::from(text.clone()),
            Body::Bytes(bytes) => bytes.clone(),
        }
    }
}

impl From<serde_json::Value> for Body {
    fn from(value: serde_json::Value) -> Self {
        Body::Value(value)
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Text(text.to_string())
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Body::Bytes(bytes)
    }
}

/// The response shaped by hooks and handlers.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Body,
    serialize: bool,
}

impl Response {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Body::Empty,
            serialize: true,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn has_header(&self, name: impl header::AsHeaderName) -> bool {
        self.headers.contains_key(name)
    }

    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    pub fn add_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.append(name, value);
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header(header::CONTENT_TYPE.as_str())
    }

    /// Set Content-Type; invalid header text is logged and ignored.
    pub fn set_content_type(&mut self, media_type: &str) {
        match HeaderValue::from_str(media_type) {
            Ok(value) => {
                self.headers.insert(header::CONTENT_TYPE, value);
            }
            Err(_) => {
                tracing::warn!(media_type = %media_type, "Ignoring invalid content type");
            }
        }
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn set_body(&mut self, body: impl Into<Body>) {
        self.body = body.into();
    }

    pub fn take_body(&mut self) -> Body {
        std::mem::take(&mut self.body)
    }

    pub fn clear_body(&mut self) {
        self.body = Body::Empty;
    }

    pub fn has_body(&self) -> bool {
        !self.body.is_empty()
    }

    /// Whether the body should pass through the negotiated serializer.
    pub fn is_serialized(&self) -> bool {
        self.serialize
    }

    pub fn set_serialized(&mut self, serialize: bool) {
        self.serialize = serialize;
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}
