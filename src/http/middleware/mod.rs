//! Middleware.
//!
//! # Data Flow
//! ```text
//! Router::use_middleware(m1), (m2), ...
//!     → chain.rs (incremental composition, first registered outermost)
//!     → per request: composed(matched handler)
//!
//! Built-ins:
//!     request_id.rs → x-request-id extension + response header
//!     logger.rs     → one tracing event per request
//!     metrics.rs    → request counter + latency histogram
//! ```

pub mod chain;
pub mod logger;
pub mod metrics;
pub mod request_id;

pub use chain::{from_fn, Chain, Middleware, Next};
pub use logger::request_logger;
pub use metrics::metrics;
pub use request_id::request_id;
