//! Servlet host library.
//!
//! An HTTP request-serving runtime with ordered middleware, a capturing
//! response writer and a lifecycle coordinator that starts and stops
//! auxiliary services ("servlets") around the HTTP engine.

pub mod component;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;
pub mod server;

pub use component::{Component, Group};
pub use config::ServerConfig;
pub use error::{BoxError, Error, Result};
pub use http::middleware::{from_fn, Next};
pub use http::{RequestExt, ResponseState, ResponseWriter};
pub use lifecycle::{Context, Servlet};
pub use routing::{handler_fn, BoxHandler, Handler, Router};
pub use server::Server;
