//! Route registration and dispatch.
//!
//! # Responsibilities
//! - Bind handlers to patterns and mount sub-routers under prefixes
//! - Wrap every dispatched handler (404/405 included) in the middleware chain
//! - Expose the match result as request extensions
//!
//! # Design Decisions
//! - Registration takes `&mut self`; a router shared with the engine is frozen
//! - Invalid or conflicting registrations return errors, never panic
//! - A router is itself a `Handler`, which is all mounting needs

use std::sync::Arc;

use axum::body::Body;
use axum::http::uri::PathAndQuery;
use axum::http::{Request, Uri};
use futures_util::future::BoxFuture;

use crate::error::{Error, Result};
use crate::http::middleware::chain::Chain;
use crate::http::response::{ResponseState, ResponseWriter};
use crate::routing::handler::{
    handler_fn, BoxHandler, Handler, MatchedPattern, NotFound, PathParams,
};
use crate::routing::table::{Resolved, RouteTable};

/// Name of the catch-all segment used by mounts.
const REMAINDER: &str = "remainder";

#[derive(Default)]
pub struct Router {
    table: RouteTable,
    chain: Chain,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a middleware. The first registered runs outermost.
    pub fn use_middleware<M>(&mut self, middleware: M)
    where
        M: Fn(BoxHandler) -> BoxHandler + Send + Sync + 'static,
    {
        self.chain.push(middleware);
    }

    /// Bind `handler` to `pattern` (`"[METHOD ]/path"`).
    pub fn handle<H: Handler>(&mut self, pattern: &str, handler: H) -> Result<()> {
        self.table.insert(pattern, Arc::new(handler))
    }

    pub fn handle_fn<F>(&mut self, pattern: &str, f: F) -> Result<()>
    where
        F: for<'a> Fn(&'a mut ResponseState, Request<Body>) -> BoxFuture<'a, ()>
            + Send
            + Sync
            + 'static,
    {
        self.handle(pattern, handler_fn(f))
    }

    /// Serve `sub` under `prefix` with the prefix stripped from the path.
    ///
    /// `"/"` makes `sub` the fallback for everything no pattern claims.
    /// Otherwise the bare prefix, `prefix/` and everything below it are
    /// claimed; the first two reach `sub` as `/`.
    pub fn mount<H: Handler>(&mut self, prefix: &str, sub: H) -> Result<()> {
        if prefix.is_empty() {
            return Err(Error::InvalidPattern(prefix.to_string()));
        }
        if prefix == "/" {
            return self.table.set_fallback(prefix, Arc::new(sub));
        }

        let prefix = prefix.strip_suffix('/').unwrap_or(prefix);
        if !prefix.starts_with('/') || prefix.contains(['{', '}']) {
            return Err(Error::InvalidPattern(prefix.to_string()));
        }

        let handler: BoxHandler = Arc::new(StripPrefix {
            prefix: prefix.to_string(),
            inner: Arc::new(sub),
        });
        self.table.insert(prefix, handler.clone())?;
        self.table.insert(&format!("{prefix}/"), handler.clone())?;
        self.table
            .insert(&format!("{prefix}/{{*{REMAINDER}}}"), handler)?;

        tracing::debug!(prefix = %prefix, "Router mounted");
        Ok(())
    }

    /// Look up the handler for `req` without running it.
    pub fn resolve(&self, req: &Request<Body>) -> Resolved {
        self.table.resolve(req.method(), req.uri().path())
    }

    /// Resolve `req` and run the matched handler inside the middleware chain.
    pub async fn dispatch(&self, w: &mut ResponseState, mut req: Request<Body>) {
        let Resolved {
            handler,
            pattern,
            params,
        } = self.resolve(&req);

        req.extensions_mut().insert(MatchedPattern(pattern));
        req.extensions_mut().insert(params);

        self.chain.then(handler).serve(w, req).await
    }

    /// Wrap `writer` for this request and dispatch.
    ///
    /// Returns the state so callers can inspect or finish the response.
    pub async fn serve_with(
        &self,
        writer: Box<dyn ResponseWriter>,
        req: Request<Body>,
    ) -> ResponseState {
        let mut state = ResponseState::new(writer);
        self.dispatch(&mut state, req).await;
        state
    }

    pub fn middleware_len(&self) -> usize {
        self.chain.len()
    }
}

impl Handler for Router {
    fn serve<'a>(&'a self, w: &'a mut ResponseState, req: Request<Body>) -> BoxFuture<'a, ()> {
        Box::pin(self.dispatch(w, req))
    }
}

/// Forwards requests under `prefix` with the prefix removed from the path.
struct StripPrefix {
    prefix: String,
    inner: BoxHandler,
}

impl StripPrefix {
    fn rewrite(&self, uri: &Uri) -> Option<Uri> {
        let rest = uri.path().strip_prefix(self.prefix.as_str())?;
        let path = if rest.is_empty() { "/" } else { rest };
        let path_and_query = match uri.query() {
            Some(query) => format!("{path}?{query}"),
            None => path.to_string(),
        };

        let mut parts = uri.clone().into_parts();
        parts.path_and_query = Some(PathAndQuery::try_from(path_and_query).ok()?);
        Uri::from_parts(parts).ok()
    }
}

impl Handler for StripPrefix {
    fn serve<'a>(&'a self, w: &'a mut ResponseState, mut req: Request<Body>) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            match self.rewrite(req.uri()) {
                Some(uri) => {
                    req.extensions_mut().remove::<PathParams>();
                    *req.uri_mut() = uri;
                    self.inner.serve(w, req).await
                }
                None => NotFound.serve(w, req).await,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use axum::http::{header, Method, StatusCode};

    use crate::http::middleware::chain::from_fn;
    use crate::http::recorder::ResponseRecorder;
    use crate::http::request::RequestExt;

    fn request(method: Method, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    /// Writes `tag` followed by the path and query the handler saw.
    fn echo(tag: &'static str) -> impl Handler {
        handler_fn(move |w, req| {
            Box::pin(async move {
                let seen = format!("{tag} {}", req.uri());
                w.write_all(seen.as_bytes()).await.unwrap();
            })
        })
    }

    async fn call(router: &Router, method: Method, uri: &str) -> ResponseRecorder {
        let state = router
            .serve_with(Box::new(ResponseRecorder::new()), request(method, uri))
            .await;
        let writer: Box<dyn std::any::Any> = state.into_inner();
        *writer.downcast::<ResponseRecorder>().unwrap()
    }

    #[tokio::test]
    async fn test_handle_and_dispatch() {
        let mut router = Router::new();
        router.handle("GET /hello", echo("hello")).unwrap();

        let rec = call(&router, Method::GET, "/hello").await;
        assert_eq!(rec.status(), StatusCode::OK);
        assert_eq!(rec.body_string(), "hello /hello");
    }

    #[tokio::test]
    async fn test_not_found_and_method_not_allowed() {
        let mut router = Router::new();
        router.handle("GET /only-get", echo("x")).unwrap();

        let rec = call(&router, Method::GET, "/nope").await;
        assert_eq!(rec.status(), StatusCode::NOT_FOUND);
        assert_eq!(rec.body_string(), "404 page not found\n");

        let rec = call(&router, Method::POST, "/only-get").await;
        assert_eq!(rec.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(rec.headers()[header::ALLOW], "GET, HEAD");
    }

    #[tokio::test]
    async fn test_mount_strips_prefix() {
        let mut api = Router::new();
        api.handle("GET /users", echo("api")).unwrap();

        let mut router = Router::new();
        router.mount("/api/", api).unwrap();

        let rec = call(&router, Method::GET, "/api/users?page=2").await;
        assert_eq!(rec.status(), StatusCode::OK);
        assert_eq!(rec.body_string(), "api /users?page=2");

        let rec = call(&router, Method::GET, "/users").await;
        assert_eq!(rec.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_mount_prefix_root_maps_to_slash() {
        let mut sub = Router::new();
        sub.handle("GET /", echo("root")).unwrap();

        let mut router = Router::new();
        router.mount("/docs", sub).unwrap();

        let rec = call(&router, Method::GET, "/docs/").await;
        assert_eq!(rec.body_string(), "root /");

        let rec = call(&router, Method::GET, "/docs?page=2").await;
        assert_eq!(rec.body_string(), "root /?page=2");
    }

    #[tokio::test]
    async fn test_mount_at_root_is_unprefixed() {
        let mut sub = Router::new();
        sub.handle("GET /users", echo("sub")).unwrap();

        let mut router = Router::new();
        router.handle("GET /own", echo("own")).unwrap();
        router.mount("/", sub).unwrap();

        assert_eq!(call(&router, Method::GET, "/users").await.body_string(), "sub /users");
        assert_eq!(call(&router, Method::GET, "/own").await.body_string(), "own /own");
    }

    #[test]
    fn test_invalid_registrations() {
        let mut router = Router::new();
        assert!(matches!(
            router.mount("", Router::new()),
            Err(Error::InvalidPattern(_))
        ));
        assert!(matches!(
            router.handle("", echo("x")),
            Err(Error::InvalidPattern(_))
        ));

        router.handle("GET /dup", echo("x")).unwrap();
        assert!(matches!(
            router.handle("GET /dup", echo("y")),
            Err(Error::RouteConflict { .. })
        ));
    }

    #[tokio::test]
    async fn test_middleware_wraps_unmatched_requests() {
        let statuses = Arc::new(Mutex::new(Vec::new()));
        let statuses_seen = statuses.clone();

        let mut router = Router::new();
        router.use_middleware(from_fn(move |w, req, next| {
            let statuses_seen = statuses_seen.clone();
            Box::pin(async move {
                next.run(w, req).await;
                statuses_seen.lock().unwrap().push(w.status().as_u16());
            })
        }));
        router.handle("GET /ok", echo("ok")).unwrap();

        call(&router, Method::GET, "/ok").await;
        call(&router, Method::GET, "/missing").await;
        call(&router, Method::PUT, "/ok").await;

        assert_eq!(*statuses.lock().unwrap(), vec![200, 404, 405]);
    }

    #[tokio::test]
    async fn test_pattern_and_params_visible_to_handler() {
        let mut router = Router::new();
        router
            .handle_fn("GET /users/{id}", |w, req| {
                Box::pin(async move {
                    let body = format!(
                        "{} {}",
                        req.matched_pattern().unwrap_or_default(),
                        req.path_param("id").unwrap_or_default()
                    );
                    w.write_all(body.as_bytes()).await.unwrap();
                })
            })
            .unwrap();

        let rec = call(&router, Method::GET, "/users/7").await;
        assert_eq!(rec.body_string(), "GET /users/{id} 7");
    }

    #[test]
    fn test_resolve_without_running() {
        let mut router = Router::new();
        router.handle("POST /jobs", echo("jobs")).unwrap();

        let resolved = router.resolve(&request(Method::POST, "/jobs"));
        assert_eq!(resolved.pattern, "POST /jobs");
        assert_eq!(router.resolve(&request(Method::GET, "/x")).pattern, "");
    }
}
