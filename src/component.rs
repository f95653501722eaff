//! Prefixed route groups.
//!
//! A component contributes a router mounted under its prefix. A component
//! that also needs start/stop hooks returns itself from
//! [`Component::servlet`] and is then driven by the lifecycle coordinator.

use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use futures_util::future::BoxFuture;

use crate::http::response::ResponseState;
use crate::lifecycle::servlet::Servlet;
use crate::routing::handler::Handler;
use crate::routing::router::Router;

pub trait Component: Send + Sync + 'static {
    /// Mount prefix, e.g. `"/api"`, or `"/"` for the root.
    fn prefix(&self) -> &str;

    fn router(&self) -> &Router;

    /// The lifecycle half of this component, if it has one.
    ///
    /// Components that implement [`Servlet`] return `Some(self)`.
    fn servlet(self: Arc<Self>) -> Option<Arc<dyn Servlet>> {
        None
    }
}

/// A component that is only routes.
pub struct Group {
    prefix: String,
    router: Router,
}

impl Group {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            router: Router::new(),
        }
    }

    pub fn router_mut(&mut self) -> &mut Router {
        &mut self.router
    }
}

impl Component for Group {
    fn prefix(&self) -> &str {
        &self.prefix
    }

    fn router(&self) -> &Router {
        &self.router
    }
}

/// Serves a shared component through its router.
pub(crate) struct Mounted<C>(pub(crate) Arc<C>);

impl<C: Component> Handler for Mounted<C> {
    fn serve<'a>(&'a self, w: &'a mut ResponseState, req: Request<Body>) -> BoxFuture<'a, ()> {
        self.0.router().serve(w, req)
    }
}
