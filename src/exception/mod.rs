//! Translation of handler failures into HTTP responses.
//!
//! # Responsibilities
//! - Use a `ServiceError`'s own status, headers and details
//! - Map other failure types to service errors via a startup registry
//! - Hide everything else behind a generic 500
//!
//! # Design Decisions
//! - The registry matches a failure or anything in its `source()` chain
//! - The first registered mapping wins
//! - Unmapped failure text is only logged, never written to the body

use std::error::Error;
use std::fmt;

use axum::http::{HeaderMap, StatusCode};
use serde::Serialize;

use crate::error::{ServiceError, ServiceErrorKind};
use crate::http::Response;

/// Message used for failures nobody mapped.
pub const GENERIC_MESSAGE: &str = "Internal Server Error";

struct MappingEntry {
    type_name: &'static str,
    matches: fn(&(dyn Error + 'static)) -> bool,
    kind: ServiceErrorKind,
}

fn is_type<E: Error + 'static>(error: &(dyn Error + 'static)) -> bool {
    error.is::<E>()
}

/// Failure types mapped to service error kinds.
#[derive(Default)]
pub struct ExceptionMapping {
    entries: Vec<MappingEntry>,
}

impl ExceptionMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Translate failures of type `E` into `kind`.
    pub fn map<E: Error + 'static>(mut self, kind: ServiceErrorKind) -> Self {
        self.entries.push(MappingEntry {
            type_name: std::any::type_name::<E>(),
            matches: is_type::<E>,
            kind,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The service error a mapped failure turns into, if any.
    pub fn lookup(&self, failure: &(dyn Error + 'static)) -> Option<ServiceError> {
        self.entries.iter().find_map(|entry| {
            chain(failure)
                .find(|e| (entry.matches)(*e))
                .map(|e| ServiceError::new(entry.kind, e.to_string()))
        })
    }
}

impl fmt::Debug for ExceptionMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|e| (e.type_name, e.kind)))
            .finish()
    }
}

/// Body written for a failed request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorPayload {
    pub code: u16,
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorPayload {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code: status.as_u16(),
            status: status.canonical_reason().unwrap_or("Unknown Status").to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// What a failure turns into on the wire.
#[derive(Debug, Clone)]
pub struct TranslatedFailure {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub payload: ErrorPayload,
    /// Deepest cause, for logs only.
    pub root_cause: String,
}

impl TranslatedFailure {
    fn from_service_error(error: &ServiceError, root_cause: String) -> Self {
        let mut payload = ErrorPayload::new(error.status(), error.message());
        payload.details = error.details().cloned();
        Self {
            status: error.status(),
            headers: error.headers().clone(),
            payload,
            root_cause,
        }
    }

    /// Set status, headers and the payload body on a response.
    pub fn apply(&self, response: &mut Response) {
        response.set_status(self.status);
        for (name, value) in self.headers.iter() {
            response.headers_mut().append(name.clone(), value.clone());
        }
        response.set_body(self.payload.to_value());
    }
}

/// Turns failures into statuses and payloads.
#[derive(Debug, Default)]
pub struct ExceptionTranslator {
    mapping: ExceptionMapping,
}

impl ExceptionTranslator {
    pub fn new(mapping: ExceptionMapping) -> Self {
        Self { mapping }
    }

    pub fn mapping(&self) -> &ExceptionMapping {
        &self.mapping
    }

    pub fn translate(&self, failure: &(dyn Error + 'static)) -> TranslatedFailure {
        let root_cause = root_cause(failure).to_string();

        if let Some(error) = chain(failure).find_map(|e| e.downcast_ref::<ServiceError>()) {
            return TranslatedFailure::from_service_error(error, root_cause);
        }

        if let Some(error) = self.mapping.lookup(failure) {
            return TranslatedFailure::from_service_error(&error, root_cause);
        }

        tracing::debug!(root_cause = %root_cause, "Unmapped failure translated to 500");
        let status = StatusCode::INTERNAL_SERVER_ERROR;
        TranslatedFailure {
            status,
            headers: HeaderMap::new(),
            payload: ErrorPayload::new(status, GENERIC_MESSAGE),
            root_cause,
        }
    }
}

/// The failure followed by its sources.
fn chain<'a>(failure: &'a (dyn Error + 'static)) -> impl Iterator<Item = &'a (dyn Error + 'static)> {
    std::iter::successors(Some(failure), |&e| e.source())
}

/// The deepest error in the source chain.
pub fn root_cause<'a>(failure: &'a (dyn Error + 'static)) -> &'a (dyn Error + 'static) {
    chain(failure).last().unwrap_or(failure)
}
