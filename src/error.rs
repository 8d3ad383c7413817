//! Failure types shared by the dispatch core.
//!
//! # Responsibilities
//! - Define the `Failure` currency handlers and hooks return
//! - Define `ServiceError`, a failure that knows its own HTTP status
//! - Describe how a service error augments the outgoing response
//!
//! # Design Decisions
//! - Handlers fail with any boxed error; only `ServiceError` carries a status
//! - Unknown failures become 500 in `exception`, never here

use std::fmt;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use thiserror::Error;

use crate::http::Response;

/// Any failure raised by a handler, hook or observer.
pub type Failure = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result returned by hooks and observers.
pub type HookResult = Result<(), Failure>;

/// Categories of service failure, each bound to an HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceErrorKind {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    MethodNotAllowed,
    NotAcceptable,
    Conflict,
    UnsupportedMediaType,
    InternalServerError,
    NotImplemented,
    ServiceUnavailable,
    /// Any other status, for application-specific mappings.
    Status(StatusCode),
}

impl ServiceErrorKind {
    /// The HTTP status this kind maps to.
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceErrorKind::BadRequest => StatusCode::BAD_REQUEST,
            ServiceErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ServiceErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ServiceErrorKind::NotFound => StatusCode::NOT_FOUND,
            ServiceErrorKind::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ServiceErrorKind::NotAcceptable => StatusCode::NOT_ACCEPTABLE,
            ServiceErrorKind::Conflict => StatusCode::CONFLICT,
            ServiceErrorKind::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ServiceErrorKind::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceErrorKind::NotImplemented => StatusCode::NOT_IMPLEMENTED,
            ServiceErrorKind::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ServiceErrorKind::Status(status) => *status,
        }
    }
}

impl fmt::Display for ServiceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = self.status();
        write!(
            f,
            "{} {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown Status")
        )
    }
}

/// A failure with an intrinsic HTTP status.
///
/// Besides the status, a service error may carry headers and a structured
/// detail value that are copied onto the response when it is translated.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct ServiceError {
    kind: ServiceErrorKind,
    message: String,
    headers: HeaderMap,
    details: Option<serde_json::Value>,
    #[source]
    source: Option<Failure>,
}

impl ServiceError {
    pub fn new(kind: ServiceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            headers: HeaderMap::new(),
            details: None,
            source: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::BadRequest, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::NotFound, message)
    }

    /// 405 carrying the methods that would have matched, as an `Allow` header.
    pub fn method_not_allowed(method: &Method, path: &str, allowed: &[Method]) -> Self {
        let allow = allowed
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        let error = Self::new(
            ServiceErrorKind::MethodNotAllowed,
            format!("{} is not supported for {} (allowed: {})", method, path, allow),
        );
        match HeaderValue::from_str(&allow) {
            Ok(value) => error.with_header(header::ALLOW, value),
            Err(_) => error,
        }
    }

    pub fn not_acceptable(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::NotAcceptable, message)
    }

    pub fn unsupported_media_type(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::UnsupportedMediaType, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::InternalServerError, message)
    }

    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::NotImplemented, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::ServiceUnavailable, message)
    }

    /// Add a header that will be set on the response.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Attach a structured value rendered under `details` in the error body.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_source(mut self, source: impl Into<Failure>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn kind(&self) -> ServiceErrorKind {
        self.kind
    }

    pub fn status(&self) -> StatusCode {
        self.kind.status()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn details(&self) -> Option<&serde_json::Value> {
        self.details.as_ref()
    }

    /// Copy this error's status and headers onto a response.
    pub fn augment_response(&self, response: &mut Response) {
        response.set_status(self.status());
        for (name, value) in self.headers.iter() {
            response.headers_mut().append(name.clone(), value.clone());
        }
    }
}
