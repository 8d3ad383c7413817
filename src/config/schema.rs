//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! dispatcher. All types derive Serde traits for deserialization from
//! config files, and every field has a default so minimal files work.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener and HTTP settings.
    pub server: HttpConfig,

    /// Handler execution settings.
    pub executor: ExecutorConfig,

    /// Serialization settings.
    pub serialization: SerializationConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener and HTTP settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    /// Name reported in logs.
    pub name: String,

    /// Bind address (e.g., "0.0.0.0:10080").
    pub bind_address: String,

    /// Prefix for links built from route patterns.
    pub base_url: String,

    /// Keep connections open between requests.
    pub keep_alive: bool,

    /// Largest accepted request body, in bytes.
    pub max_content_size: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            name: "rest-dispatch".to_string(),
            bind_address: "0.0.0.0:10080".to_string(),
            base_url: String::new(),
            keep_alive: true,
            max_content_size: 1024 * 1024,
        }
    }
}

/// Handler execution settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Handlers allowed to run at once on the blocking pool.
    /// Zero runs handlers inline on the I/O task.
    pub worker_threads: usize,

    /// Handler timeout in milliseconds. Zero disables it.
    pub handler_timeout_ms: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            worker_threads: 16,
            handler_timeout_ms: 2000,
        }
    }
}

/// Serialization settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SerializationConfig {
    /// Format used when a request expresses no preference.
    pub default_format: String,
}

impl Default for SerializationConfig {
    fn default() -> Self {
        Self {
            default_format: "json".to_string(),
        }
    }
}

/// Observability settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log filter directives; `RUST_LOG` takes precedence.
    pub log_filter: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,

    /// Record request metrics.
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: "rest_dispatch=info,tower_http=info".to_string(),
            json_logs: false,
            metrics_enabled: true,
        }
    }
}
