//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML files and
//! default every field, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};

/// Root configuration for the servlet host.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    pub listener: ListenerConfig,

    /// Response streaming settings.
    pub http: HttpConfig,

    /// Servlet start/stop deadlines.
    pub lifecycle: LifecycleConfig,

    /// Per-request time limits.
    pub timeouts: TimeoutConfig,

    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address, `"host:port"`. An empty host binds every interface.
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Body bytes buffered before a frame is sent to the client.
    pub body_buffer_bytes: usize,

    /// Frames queued between a handler and its connection.
    pub body_channel_capacity: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            body_buffer_bytes: 4096,
            body_channel_capacity: 16,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Deadline for starting every servlet.
    pub startup_timeout_secs: u64,

    /// Deadline for draining in-flight requests on stop.
    pub shutdown_timeout_secs: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            startup_timeout_secs: 30,
            shutdown_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Time allowed for a handler to produce the response head, in seconds.
    /// Requests that take longer are answered with `408 Request Timeout`.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    pub log_level: String,

    pub log_format: LogFormat,

    /// Install the Prometheus exporter.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
