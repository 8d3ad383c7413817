//! HTTP rules every outgoing response must respect.

use axum::http::{header, StatusCode};

use crate::http::Response;

/// Statuses that never carry content: 1xx, 204 and 304.
pub fn is_content_allowed(status: StatusCode) -> bool {
    !(status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED)
}

pub fn is_content_length_allowed(status: StatusCode) -> bool {
    is_content_allowed(status)
}

/// Strip anything the status forbids from a response.
pub fn enforce(response: &mut Response) {
    if is_content_allowed(response.status()) {
        return;
    }
    if response.has_body() {
        tracing::debug!(status = %response.status(), "Dropping body not permitted for status");
    }
    response.clear_body();
    response.headers_mut().remove(header::CONTENT_LENGTH);
}
