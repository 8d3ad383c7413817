//! Per-request pipeline state.

use std::fmt;
use std::time::{Duration, Instant};

use axum::http::StatusCode;

use crate::error::Failure;
use crate::http::{Request, Response};
use crate::routing::Action;
use crate::serialization::SerializationSettings;

/// Where a request is in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineState {
    Received,
    Resolved,
    Preprocessed,
    Invoked,
    Postprocessed,
    Serialized,
    Written,
    Completed,
    Excepted,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Received => "received",
            PipelineState::Resolved => "resolved",
            PipelineState::Preprocessed => "preprocessed",
            PipelineState::Invoked => "invoked",
            PipelineState::Postprocessed => "postprocessed",
            PipelineState::Serialized => "serialized",
            PipelineState::Written => "written",
            PipelineState::Completed => "completed",
            PipelineState::Excepted => "excepted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        *self == PipelineState::Completed
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything one request carries through the pipeline.
///
/// Owned by the task serving the request, never shared.
pub struct MessageContext {
    request: Request,
    response: Response,
    action: Option<Action>,
    settings: Option<SerializationSettings>,
    state: PipelineState,
    failure: Option<Failure>,
    started: Instant,
}

impl MessageContext {
    pub fn new(request: Request) -> Self {
        Self {
            request,
            response: Response::new(),
            action: None,
            settings: None,
            state: PipelineState::Received,
            failure: None,
            started: Instant::now(),
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn request_mut(&mut self) -> &mut Request {
        &mut self.request
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    /// Request and response borrowed together, as hooks need them.
    pub fn parts_mut(&mut self) -> (&mut Request, &mut Response) {
        (&mut self.request, &mut self.response)
    }

    pub(crate) fn replace_parts(&mut self, request: Request, response: Response) {
        self.request = request;
        self.response = response;
    }

    pub fn action(&self) -> Option<&Action> {
        self.action.as_ref()
    }

    /// Bind the resolved route and copy its match onto the request.
    pub fn set_action(&mut self, action: Action) {
        self.request
            .apply_match(action.url_match(), action.route().name());
        self.action = Some(action);
    }

    pub fn serialization_settings(&self) -> Option<&SerializationSettings> {
        self.settings.as_ref()
    }

    pub fn set_serialization_settings(&mut self, settings: SerializationSettings) {
        self.settings = Some(settings);
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: PipelineState) {
        tracing::trace!(
            request_id = %self.request.id(),
            from = %self.state,
            to = %state,
            "Pipeline transition"
        );
        self.state = state;
    }

    pub fn status(&self) -> StatusCode {
        self.response.status()
    }

    pub fn failure(&self) -> Option<&Failure> {
        self.failure.as_ref()
    }

    pub fn has_failure(&self) -> bool {
        self.failure.is_some()
    }

    pub(crate) fn set_failure(&mut self, failure: Failure) {
        self.failure = Some(failure);
    }

    /// Time since the request entered the pipeline.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl fmt::Debug for MessageContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageContext")
            .field("request_id", self.request.id())
            .field("method", self.request.method())
            .field("path", &self.request.path())
            .field("state", &self.state)
            .field("status", &self.response.status())
            .field("has_failure", &self.failure.is_some())
            .finish()
    }
}
