//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum::serve, TraceLayer, graceful shutdown)
//!     → stream.rs (spawn handler task, StreamWriter as the sink)
//!     → routing::Router (middleware chain → handler)
//!     → response.rs (ResponseState: commit, status, size, capabilities)
//!     → stream.rs (head via oneshot, body frames via bounded mpsc)
//!     → Send to client
//! ```

pub mod middleware;
pub mod recorder;
pub mod request;
pub mod response;
pub mod server;
pub mod stream;

pub use recorder::ResponseRecorder;
pub use request::{RequestExt, RequestId, X_REQUEST_ID};
pub use response::{
    Flusher, Hijacked, Hijacker, PushOptions, Pusher, ResponseState, ResponseWriter,
};
pub use server::HttpEngine;
pub use stream::StreamWriter;
