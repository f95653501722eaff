//! Network layer.
//!
//! # Data Flow
//! ```text
//! "host:port"
//!     → listener.rs (validate, resolve, bind)
//!     → http::server::HttpEngine (implements transport.rs)
//!     → lifecycle::coordinator drives listen_and_serve / shutdown
//! ```

pub mod listener;
pub mod transport;

pub use transport::Transport;
