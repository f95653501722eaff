//! Request handlers.
//!
//! A handler receives the per-request [`ResponseState`] by mutable borrow and
//! the request by value. Middleware wraps one handler into another, so the
//! same trait serves route endpoints, composed chains and mounted routers.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderValue, Request, StatusCode};
use futures_util::future::BoxFuture;

use crate::http::response::ResponseState;

pub trait Handler: Send + Sync + 'static {
    fn serve<'a>(&'a self, w: &'a mut ResponseState, req: Request<Body>) -> BoxFuture<'a, ()>;
}

/// Shared, type-erased handler.
pub type BoxHandler = Arc<dyn Handler>;

impl<H: Handler + ?Sized> Handler for Arc<H> {
    fn serve<'a>(&'a self, w: &'a mut ResponseState, req: Request<Body>) -> BoxFuture<'a, ()> {
        (**self).serve(w, req)
    }
}

/// Handler built from a closure, see [`handler_fn`].
#[derive(Clone)]
pub struct HandlerFn<F> {
    f: F,
}

/// Turn an async closure into a [`Handler`].
///
/// ```ignore
/// let hello = handler_fn(|w, _req| Box::pin(async move {
///     let _ = w.write(b"hello").await;
/// }));
/// ```
pub fn handler_fn<F>(f: F) -> HandlerFn<F>
where
    F: for<'a> Fn(&'a mut ResponseState, Request<Body>) -> BoxFuture<'a, ()>
        + Send
        + Sync
        + 'static,
{
    HandlerFn { f }
}

impl<F> Handler for HandlerFn<F>
where
    F: for<'a> Fn(&'a mut ResponseState, Request<Body>) -> BoxFuture<'a, ()>
        + Send
        + Sync
        + 'static,
{
    fn serve<'a>(&'a self, w: &'a mut ResponseState, req: Request<Body>) -> BoxFuture<'a, ()> {
        (self.f)(w, req)
    }
}

/// Replies `404 Not Found`.
#[derive(Debug, Clone, Copy)]
pub struct NotFound;

impl Handler for NotFound {
    fn serve<'a>(&'a self, w: &'a mut ResponseState, _req: Request<Body>) -> BoxFuture<'a, ()> {
        Box::pin(plain_error(w, StatusCode::NOT_FOUND, "404 page not found\n"))
    }
}

/// Replies `405 Method Not Allowed` with the methods the path accepts.
#[derive(Debug, Clone)]
pub struct MethodNotAllowed {
    allow: String,
}

impl MethodNotAllowed {
    pub fn new(allow: impl Into<String>) -> Self {
        Self { allow: allow.into() }
    }
}

impl Handler for MethodNotAllowed {
    fn serve<'a>(&'a self, w: &'a mut ResponseState, _req: Request<Body>) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            if let Ok(value) = HeaderValue::from_str(&self.allow) {
                w.headers_mut().insert(header::ALLOW, value);
            }
            plain_error(w, StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed\n").await
        })
    }
}

async fn plain_error(w: &mut ResponseState, status: StatusCode, body: &'static str) {
    w.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    w.write_header(status);
    if let Err(e) = w.write_all(body.as_bytes()).await {
        tracing::debug!(error = %e, status = status.as_u16(), "Failed to write error body");
    }
}

/// Pattern that matched the request, inserted as a request extension.
///
/// Empty for the built-in 404/405 replies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchedPattern(pub String);

impl MatchedPattern {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Named path segments captured by the matched pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(Vec<(String, String)>);

impl PathParams {
    pub(crate) fn new(params: Vec<(String, String)>) -> Self {
        Self(params)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
