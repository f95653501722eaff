//! Middleware composition.
//!
//! For middleware registered in order m1, m2, ..., mk the composed handler
//! around a final handler H is `m1(m2(...mk(H)...))`: the first registered
//! runs its pre-logic first and its post-logic last.

use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use futures_util::future::BoxFuture;

use crate::http::response::ResponseState;
use crate::routing::handler::{BoxHandler, Handler};

/// A transform from "next handler" to "wrapped handler".
pub type Middleware = Arc<dyn Fn(BoxHandler) -> BoxHandler + Send + Sync>;

/// Ordered middleware registration with an incrementally composed function.
#[derive(Clone, Default)]
pub struct Chain {
    compose: Option<Middleware>,
    len: usize,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `middleware` as the innermost layer.
    ///
    /// The previously composed function is wrapped, not rebuilt, so earlier
    /// registrations keep their position.
    pub fn push<M>(&mut self, middleware: M)
    where
        M: Fn(BoxHandler) -> BoxHandler + Send + Sync + 'static,
    {
        let middleware: Middleware = Arc::new(middleware);
        let composed: Middleware = match self.compose.take() {
            None => middleware,
            Some(outer) => Arc::new(move |next: BoxHandler| outer(middleware(next))),
        };
        self.compose = Some(composed);
        self.len += 1;
    }

    /// Wrap `handler` in every registered middleware.
    ///
    /// Returns `handler` itself when the chain is empty.
    pub fn then(&self, handler: BoxHandler) -> BoxHandler {
        match &self.compose {
            Some(compose) => compose(handler),
            None => handler,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Continuation handed to [`from_fn`] middleware.
#[derive(Clone)]
pub struct Next {
    inner: BoxHandler,
}

impl Next {
    /// Run the rest of the chain.
    pub async fn run(self, w: &mut ResponseState, req: Request<Body>) {
        self.inner.serve(w, req).await
    }
}

struct FromFn<F> {
    f: Arc<F>,
    next: BoxHandler,
}

impl<F> Handler for FromFn<F>
where
    F: for<'a> Fn(&'a mut ResponseState, Request<Body>, Next) -> BoxFuture<'a, ()>
        + Send
        + Sync
        + 'static,
{
    fn serve<'a>(&'a self, w: &'a mut ResponseState, req: Request<Body>) -> BoxFuture<'a, ()> {
        let next = Next {
            inner: self.next.clone(),
        };
        (self.f)(w, req, next)
    }
}

/// Build middleware from an async closure taking the continuation.
///
/// ```ignore
/// router.use_middleware(from_fn(|w, req, next| Box::pin(async move {
///     next.run(w, req).await;
///     tracing::info!(status = w.status().as_u16(), "done");
/// })));
/// ```
pub fn from_fn<F>(f: F) -> impl Fn(BoxHandler) -> BoxHandler + Send + Sync + 'static
where
    F: for<'a> Fn(&'a mut ResponseState, Request<Body>, Next) -> BoxFuture<'a, ()>
        + Send
        + Sync
        + 'static,
{
    let f = Arc::new(f);
    move |next: BoxHandler| -> BoxHandler {
        Arc::new(FromFn {
            f: Arc::clone(&f),
            next,
        })
    }
}
