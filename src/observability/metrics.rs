//! Metrics collection.
//!
//! # Responsibilities
//! - Record per-request counters and latency through the `metrics` facade
//! - Count translated failures and failing hooks
//!
//! # Metrics
//! - `dispatch_requests_total` (counter): requests by method, status, route
//! - `dispatch_request_duration_seconds` (histogram): pipeline latency
//! - `dispatch_failures_total` (counter): translated failures by status
//! - `dispatch_hook_failures_total` (counter): hook and observer errors by stage
//!
//! # Design Decisions
//! - No recorder is installed here; without one every call is a no-op
//! - Route label is the route template, or `none` when nothing matched

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use metrics::{counter, histogram};

static ENABLED: AtomicBool = AtomicBool::new(true);

/// Turn recording on or off process-wide.
pub fn set_enabled(enabled: bool) {
    ENABLED.store(enabled, Ordering::Relaxed);
}

pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

/// Record a completed request.
pub fn record_request(method: &str, status: u16, route: &str, elapsed: Duration) {
    if !is_enabled() {
        return;
    }
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
        ("route", route.to_string()),
    ];
    counter!("dispatch_requests_total", &labels).increment(1);
    histogram!("dispatch_request_duration_seconds", &labels).record(elapsed.as_secs_f64());
}

/// Record a failure translated onto a response.
pub fn record_failure(status: u16) {
    if !is_enabled() {
        return;
    }
    counter!("dispatch_failures_total", "status" => status.to_string()).increment(1);
}

/// Record a hook or observer error.
pub fn record_hook_failure(stage: &'static str) {
    if !is_enabled() {
        return;
    }
    counter!("dispatch_hook_failures_total", "stage" => stage).increment(1);
}
