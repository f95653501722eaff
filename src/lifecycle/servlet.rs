//! Servlet contract.

use async_trait::async_trait;

use crate::error::BoxError;
use crate::lifecycle::context::Context;

/// A long-lived unit started before the server accepts traffic and stopped,
/// in reverse registration order, before in-flight requests are drained.
///
/// `stop` must be idempotent.
#[async_trait]
pub trait Servlet: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Acquire resources and spawn background work. Honour `ctx`.
    async fn start(&self, ctx: &Context) -> Result<(), BoxError>;

    async fn stop(&self) -> Result<(), BoxError>;
}
