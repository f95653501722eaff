//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Server::start(ctx):
//!     coordinator.rs start → S1.start, S2.start, ... Sn.start
//!         (failure at Si → S(i-1).stop ... S1.stop, return Si's error)
//!     → transport bound and serving
//!     → coordinator.rs arm (background task waits for the handoff)
//!
//! Server::stop(ctx):
//!     coordinator.rs stop → handoff(ctx, reply)
//!     → background task: Sn.stop ... S1.stop, transport.shutdown(ctx)
//!     → reply with the drain result
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → shutdown_signal() resolves
//! ```
//!
//! # Design Decisions
//! - Ordered startup: servlets first, listener last (traffic only when ready)
//! - Ordered shutdown: servlets in reverse, then drain
//! - Shutdown has a deadline: the stop context bounds the drain

pub mod context;
pub mod coordinator;
pub mod servlet;
pub mod signals;

pub use context::Context;
pub use coordinator::Coordinator;
pub use servlet::Servlet;
pub use signals::shutdown_signal;
