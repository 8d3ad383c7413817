//! Response emission to the transport.
//!
//! # Responsibilities
//! - Convert the pipeline's `Response` into the transport response
//! - Apply Content-Length and connection semantics
//!
//! # Design Decisions
//! - Content-Length only for keep-alive responses that may carry content
//! - Non keep-alive responses announce `Connection: close`; hyper closes the
//!   connection once the response is flushed
//! - HTTP/1.0 keep-alive is acknowledged explicitly
//! - HTTP/2 responses never carry connection headers

use axum::body::Body as WireBody;
use axum::http::{header, HeaderValue, Version};

use crate::http::specification;
use crate::http::{Request, Response};

/// The transport response produced by a writer.
pub type WireResponse = axum::response::Response;

/// Turns a finished response into what the transport sends.
pub trait ResponseWriter: Send + Sync {
    fn write(&self, request: &Request, response: &Response) -> WireResponse;
}

/// Writer honoring keep-alive, Content-Length and body rules.
#[derive(Debug, Clone)]
pub struct DefaultResponseWriter {
    keep_alive: bool,
}

impl DefaultResponseWriter {
    /// `keep_alive = false` closes every connection after its response.
    pub fn new(keep_alive: bool) -> Self {
        Self { keep_alive }
    }
}

impl Default for DefaultResponseWriter {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ResponseWriter for DefaultResponseWriter {
    fn write(&self, request: &Request, response: &Response) -> WireResponse {
        let status = response.status();
        let content = if response.has_body() && specification::is_content_allowed(status) {
            response.body().to_bytes()
        } else {
            Default::default()
        };
        let length = content.len();

        let mut wire = WireResponse::new(WireBody::from(content));
        *wire.status_mut() = status;

        let headers = wire.headers_mut();
        for (name, value) in response.headers().iter() {
            headers.append(name.clone(), value.clone());
        }
        headers.remove(header::CONTENT_LENGTH);
        headers.remove(header::CONNECTION);

        // Connection-specific headers are illegal beyond HTTP/1.1.
        let http1 = request.version() != Version::HTTP_2 && request.version() != Version::HTTP_3;

        if !http1 || (self.keep_alive && request.is_keep_alive()) {
            if specification::is_content_length_allowed(status) {
                headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
            }
            if request.version() == Version::HTTP_10 {
                headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
            }
        } else {
            headers.insert(header::CONNECTION, HeaderValue::from_static("close"));
        }

        wire
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Method, StatusCode};

    fn request() -> Request {
        Request::new(Method::GET, "/test".parse().unwrap())
    }

    #[test]
    fn test_keep_alive_sets_content_length() {
        let mut response = Response::new();
        response.set_body("hello");
        let wire = DefaultResponseWriter::default().write(&request(), &response);

        assert_eq!(wire.status(), StatusCode::OK);
        assert_eq!(wire.headers().get(header::CONTENT_LENGTH).unwrap(), "5");
        assert!(wire.headers().get(header::CONNECTION).is_none());
    }

    #[test]
    fn test_no_content_has_no_length() {
        let mut response = Response::new();
        response.set_status(StatusCode::NO_CONTENT);
        response.set_body("ignored");
        let wire = DefaultResponseWriter::default().write(&request(), &response);

        assert!(wire.headers().get(header::CONTENT_LENGTH).is_none());
    }

    #[test]
    fn test_connection_close() {
        let req = request().with_header(header::CONNECTION, HeaderValue::from_static("close"));
        let wire = DefaultResponseWriter::default().write(&req, &Response::new());
        assert_eq!(wire.headers().get(header::CONNECTION).unwrap(), "close");

        let wire = DefaultResponseWriter::new(false).write(&request(), &Response::new());
        assert_eq!(wire.headers().get(header::CONNECTION).unwrap(), "close");
    }

    #[test]
    fn test_http10_keep_alive_acknowledged() {
        let req = request()
            .with_version(Version::HTTP_10)
            .with_header(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        let wire = DefaultResponseWriter::default().write(&req, &Response::new());
        assert_eq!(wire.headers().get(header::CONNECTION).unwrap(), "keep-alive");
        assert_eq!(wire.headers().get(header::CONTENT_LENGTH).unwrap(), "0");
    }
}
