//! HTTP engine.
//!
//! # Responsibilities
//! - Bind the listener and build the axum app around the router
//! - Serve with graceful shutdown
//! - Implement the `Transport` contract for the lifecycle layer
//!
//! # Design Decisions
//! - One axum fallback route forwards everything to our router, so pattern
//!   matching happens in exactly one place
//! - Binding happens before serving so address errors surface from `start`
//! - `shutdown` only signals; the serving task reports completion through
//!   the `drained` token
//! - The request timeout bounds the time to the response head; a streamed
//!   body may outlive it

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::http::stream;
use crate::lifecycle::context::Context;
use crate::net::listener;
use crate::net::transport::Transport;
use crate::routing::router::Router;

pub struct HttpEngine {
    listener: Mutex<Option<TcpListener>>,
    local_addr: SocketAddr,
    app: axum::Router,
    closing: CancellationToken,
    drained: CancellationToken,
}

impl HttpEngine {
    /// Bind `address` and prepare to serve `router`.
    pub async fn bind(address: &str, router: Arc<Router>, config: &ServerConfig) -> Result<Self> {
        let listener = listener::bind(address).await?;
        let local_addr = listener.local_addr()?;

        Ok(Self {
            listener: Mutex::new(Some(listener)),
            local_addr,
            app: Self::build_app(router, config),
            closing: CancellationToken::new(),
            drained: CancellationToken::new(),
        })
    }

    /// Build the axum app that feeds every request to `router`.
    pub fn build_app(router: Arc<Router>, config: &ServerConfig) -> axum::Router {
        let http = Arc::new(config.http.clone());
        axum::Router::new()
            .fallback(move |req: Request<Body>| {
                let router = Arc::clone(&router);
                let http = Arc::clone(&http);
                async move { stream::serve(router, req, &http).await }
            })
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(TraceLayer::new_for_http())
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

#[async_trait]
impl Transport for HttpEngine {
    async fn listen_and_serve(&self) -> Result<()> {
        let listener = self
            .listener
            .lock()
            .expect("listener mutex poisoned")
            .take()
            .ok_or(Error::AlreadyServing)?;

        tracing::info!(address = %self.local_addr, "HTTP server starting");

        let app = self
            .app
            .clone()
            .into_make_service_with_connect_info::<SocketAddr>();
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(self.closing.clone().cancelled_owned())
            .await;

        self.drained.cancel();
        tracing::info!(address = %self.local_addr, "HTTP server stopped");
        result.map_err(Error::from)
    }

    async fn shutdown(&self, ctx: &Context) -> Result<()> {
        self.closing.cancel();

        // Never served: release the socket and report drained right away.
        let idle = self
            .listener
            .lock()
            .expect("listener mutex poisoned")
            .take();
        if idle.is_some() {
            self.drained.cancel();
        }

        ctx.run(self.drained.cancelled()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::http::StatusCode;
    use tower::ServiceExt;

    fn router() -> Arc<Router> {
        let mut router = Router::new();
        router
            .handle_fn("GET /ping", |w, _req| {
                Box::pin(async move {
                    let _ = w.write_all(b"pong").await;
                })
            })
            .unwrap();
        Arc::new(router)
    }

    #[tokio::test]
    async fn test_app_forwards_to_router() {
        let app = HttpEngine::build_app(router(), &ServerConfig::default());

        let response = app
            .oneshot(Request::builder().uri("/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"pong");
    }

    #[tokio::test]
    async fn test_app_unmatched_is_404() {
        let app = HttpEngine::build_app(router(), &ServerConfig::default());
        let response = app
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_slow_handler_times_out() {
        let mut router = Router::new();
        router
            .handle_fn("GET /slow", |w, _req| {
                Box::pin(async move {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    let _ = w.write_all(b"late").await;
                })
            })
            .unwrap();

        let mut config = ServerConfig::default();
        config.timeouts.request_secs = 1;
        let app = HttpEngine::build_app(Arc::new(router), &config);

        let response = app
            .oneshot(Request::builder().uri("/slow").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    }

    #[tokio::test]
    async fn test_shutdown_without_serving() {
        let engine = HttpEngine::bind("127.0.0.1:0", router(), &ServerConfig::default())
            .await
            .unwrap();
        let ctx = Context::with_timeout(Duration::from_secs(1));

        engine.shutdown(&ctx).await.unwrap();
        assert!(matches!(
            engine.listen_and_serve().await,
            Err(Error::AlreadyServing)
        ));
    }

    #[tokio::test]
    async fn test_serve_then_shutdown() {
        let engine = Arc::new(
            HttpEngine::bind("127.0.0.1:0", router(), &ServerConfig::default())
                .await
                .unwrap(),
        );
        let serving = tokio::spawn({
            let engine = Arc::clone(&engine);
            async move { engine.listen_and_serve().await }
        });

        let url = format!("http://{}/ping", engine.local_addr());
        let body = reqwest::get(&url).await.unwrap().text().await.unwrap();
        assert_eq!(body, "pong");

        engine
            .shutdown(&Context::with_timeout(Duration::from_secs(5)))
            .await
            .unwrap();
        serving.await.unwrap().unwrap();
    }
}
