//! Demo resource served by the binary at `/test`.

use std::sync::Arc;

use axum::http::Method;
use serde_json::{json, Value};

use crate::http::{Request, Response};
use crate::routing::{uri, Controller, HandlerResult, RouteSpec};

/// Path the demo resource is mounted on.
pub const ECHO_PATH: &str = "/test";

/// Answers GET and POST with a fixed message.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoController;

impl EchoController {
    fn reply(action: &str) -> Value {
        json!({
            "action": action,
            "msg": format!("Test URI - {}", action),
        })
    }
}

impl Controller for EchoController {
    fn create(&self, _request: &mut Request, _response: &mut Response) -> HandlerResult {
        Ok(Some(Self::reply("POST").into()))
    }

    fn read(&self, _request: &mut Request, _response: &mut Response) -> HandlerResult {
        Ok(Some(Self::reply("GET").into()))
    }
}

/// GET and POST registrations for the demo resource.
pub fn routes() -> Vec<RouteSpec> {
    uri(ECHO_PATH, Arc::new(EchoController), &[Method::GET, Method::POST])
}
