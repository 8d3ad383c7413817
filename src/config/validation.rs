//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (sizes > 0, timeouts and pools bounded)
//! - Check addresses and URLs are usable
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ServerConfig;

/// Longest accepted handler timeout.
pub const MAX_HANDLER_TIMEOUT_MS: u64 = 10 * 60 * 1000;

/// Largest accepted worker pool.
pub const MAX_WORKER_THREADS: usize = 4096;

/// A semantic problem with one configuration field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Check a parsed configuration.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "server.bind_address",
            format!("'{}' is not a socket address", config.server.bind_address),
        ));
    }

    let base_url = &config.server.base_url;
    let absolute = url::Url::parse(base_url)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false);
    if !(base_url.is_empty() || base_url.starts_with('/') || absolute) {
        errors.push(ValidationError::new(
            "server.base_url",
            format!("'{}' must be empty, a path or an http(s) URL", base_url),
        ));
    }

    if config.server.max_content_size == 0 {
        errors.push(ValidationError::new("server.max_content_size", "must be greater than zero"));
    }

    if config.executor.handler_timeout_ms > MAX_HANDLER_TIMEOUT_MS {
        errors.push(ValidationError::new(
            "executor.handler_timeout_ms",
            format!("must not exceed {} ms", MAX_HANDLER_TIMEOUT_MS),
        ));
    }

    if config.executor.worker_threads > MAX_WORKER_THREADS {
        errors.push(ValidationError::new(
            "executor.worker_threads",
            format!("must not exceed {}", MAX_WORKER_THREADS),
        ));
    }

    if config.serialization.default_format.trim().is_empty() {
        errors.push(ValidationError::new("serialization.default_format", "must not be empty"));
    }

    if config.observability.log_filter.trim().is_empty() {
        errors.push(ValidationError::new("observability.log_filter", "must not be empty"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
