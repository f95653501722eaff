//! Request-scoped data.
//!
//! # Responsibilities
//! - Carry the request ID generated or accepted by the `request_id` middleware
//! - Give handlers typed access to routing extensions (pattern, path params)
//!
//! # Design Decisions
//! - Everything lives in request extensions; no side tables keyed by request
//! - Incoming `x-request-id` values are reused when they are valid header text

use axum::body::Body;
use axum::http::Request;
use uuid::Uuid;

use crate::routing::handler::{MatchedPattern, PathParams};

/// Header used to propagate request IDs.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Identifier attached to every request passing the `request_id` middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Typed accessors for request extensions set by this crate.
pub trait RequestExt {
    fn request_id(&self) -> Option<&RequestId>;

    fn matched_pattern(&self) -> Option<&str>;

    /// Value of the named path segment, e.g. `id` for `/users/{id}`.
    fn path_param(&self, name: &str) -> Option<&str>;
}

impl RequestExt for Request<Body> {
    fn request_id(&self) -> Option<&RequestId> {
        self.extensions().get::<RequestId>()
    }

    fn matched_pattern(&self) -> Option<&str> {
        self.extensions()
            .get::<MatchedPattern>()
            .map(MatchedPattern::as_str)
    }

    fn path_param(&self, name: &str) -> Option<&str> {
        self.extensions()
            .get::<PathParams>()
            .and_then(|params| params.get(name))
    }
}
