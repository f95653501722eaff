//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and value ranges
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function: `&ServerConfig → Result<(), Vec<ValidationError>>`

use std::fmt;
use std::net::SocketAddr;

use tracing_subscriber::EnvFilter;

use crate::config::schema::ServerConfig;
use crate::net::listener::split_host_port;

/// A single semantic problem, tagged with the offending field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut check = |ok: bool, field: &'static str, message: String| {
        if !ok {
            errors.push(ValidationError { field, message });
        }
    };

    if let Err(e) = split_host_port(&config.listener.bind_address) {
        check(false, "listener.bind_address", e.to_string());
    }

    check(
        config.http.body_buffer_bytes > 0,
        "http.body_buffer_bytes",
        "must be greater than zero".to_string(),
    );
    check(
        config.http.body_channel_capacity > 0,
        "http.body_channel_capacity",
        "must be greater than zero".to_string(),
    );
    check(
        config.lifecycle.startup_timeout_secs > 0,
        "lifecycle.startup_timeout_secs",
        "must be greater than zero".to_string(),
    );
    check(
        config.lifecycle.shutdown_timeout_secs > 0,
        "lifecycle.shutdown_timeout_secs",
        "must be greater than zero".to_string(),
    );

    check(
        config.timeouts.request_secs > 0,
        "timeouts.request_secs",
        "must be greater than zero".to_string(),
    );

    if let Err(e) = EnvFilter::try_new(&config.observability.log_level) {
        check(false, "observability.log_level", e.to_string());
    }
    if config.observability.metrics_enabled {
        if let Err(e) = config.observability.metrics_address.parse::<SocketAddr>() {
            check(false, "observability.metrics_address", e.to_string());
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
