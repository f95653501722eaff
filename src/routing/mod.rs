//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Registration:
//!     handle("GET /users/{id}", h) / mount("/api", sub)
//!     → table.rs (parse pattern, insert into matchit tree)
//!
//! Request:
//!     router.rs dispatch(w, req)
//!     → table.rs resolve(method, path) → handler | fallback | 404 | 405
//!     → insert MatchedPattern + PathParams extensions
//!     → middleware chain (outermost first) → handler
//! ```
//!
//! # Design Decisions
//! - Pattern syntax and matching belong to `matchit`
//! - 404 and 405 replies are ordinary handlers, so middleware sees them
//! - Mounted routers receive the path with their prefix removed

pub mod handler;
pub mod router;
pub mod table;

pub use handler::{handler_fn, BoxHandler, Handler, MatchedPattern, PathParams};
pub use router::Router;
pub use table::Resolved;
