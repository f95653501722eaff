//! Transport contract.
//!
//! The lifecycle layer only needs two things from a request-serving engine:
//! run until closed, and close with a deadline.

use async_trait::async_trait;

use crate::error::Result;
use crate::lifecycle::context::Context;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Accept and serve connections until shut down.
    ///
    /// Returns `Ok(())` after a graceful shutdown.
    async fn listen_and_serve(&self) -> Result<()>;

    /// Stop accepting and wait for in-flight requests, bounded by `ctx`.
    async fn shutdown(&self, ctx: &Context) -> Result<()>;
}
