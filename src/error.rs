//! Error types shared by every subsystem.
//!
//! # Design Decisions
//! - One enum for routing, lifecycle and transport failures
//! - `Clone` so a single shutdown result can be handed to every `stop` caller
//! - Servlet errors are kept intact behind an `Arc` and displayed transparently

use std::fmt;
use std::io;
use std::sync::Arc;

use thiserror::Error;

/// Boxed error returned by servlets.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result alias used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Optional transport capabilities a response writer may expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Flush,
    Hijack,
    Push,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Flush => f.write_str("flushing"),
            Capability::Hijack => f.write_str("hijacking"),
            Capability::Push => f.write_str("pushing"),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Empty or malformed route pattern / mount prefix.
    #[error("invalid pattern {0:?}")]
    InvalidPattern(String),

    #[error("pattern {pattern:?} conflicts with an existing route: {reason}")]
    RouteConflict { pattern: String, reason: String },

    #[error("invalid bind address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },

    /// A servlet's own start error, returned unchanged.
    #[error(transparent)]
    Servlet(Arc<dyn std::error::Error + Send + Sync>),

    #[error("context canceled")]
    Cancelled,

    #[error("context deadline exceeded")]
    DeadlineExceeded,

    #[error("server already started")]
    AlreadyStarted,

    #[error("server not started")]
    NotStarted,

    #[error("coordinator exited before completing shutdown")]
    CoordinatorGone,

    #[error("transport is already serving")]
    AlreadyServing,

    #[error("connection has been hijacked")]
    Hijacked,

    #[error("response writer {writer} does not support {capability}")]
    Unsupported {
        writer: &'static str,
        capability: Capability,
    },

    #[error("transport I/O error: {0}")]
    Io(Arc<io::Error>),
}

impl Error {
    /// Wrap an error returned by a servlet.
    pub fn servlet(err: BoxError) -> Self {
        Error::Servlet(Arc::from(err))
    }

    /// True for the recoverable "capability not supported" failure.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Error::Unsupported { .. })
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(Arc::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_servlet_error_is_transparent() {
        let err = Error::servlet("boom".into());
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_unsupported_message_names_writer_and_capability() {
        let err = Error::Unsupported {
            writer: "Recorder",
            capability: Capability::Push,
        };
        assert!(err.is_unsupported());
        assert_eq!(
            err.to_string(),
            "response writer Recorder does not support pushing"
        );
    }
}
