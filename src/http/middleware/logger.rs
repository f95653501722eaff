//! Request logging middleware.
//!
//! Emits one `tracing` event per request after the inner handler returns,
//! using the captured status and size.

use std::net::SocketAddr;
use std::time::Instant;

use axum::extract::ConnectInfo;

use crate::http::middleware::chain::from_fn;
use crate::http::request::RequestExt;
use crate::routing::handler::BoxHandler;

pub fn request_logger() -> impl Fn(BoxHandler) -> BoxHandler + Send + Sync + 'static {
    from_fn(|w, req, next| {
        Box::pin(async move {
            let start = Instant::now();
            let method = req.method().clone();
            let path = req.uri().path().to_string();
            let pattern = req.matched_pattern().unwrap_or_default().to_string();
            let request_id = req.request_id().map(|id| id.to_string());
            let peer = req
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|info| info.0);

            next.run(w, req).await;

            tracing::info!(
                method = %method,
                path = %path,
                status = w.status().as_u16(),
                size = w.size(),
                pattern = %pattern,
                latency_ms = start.elapsed().as_millis() as u64,
                request_id = ?request_id,
                peer = ?peer,
                "Request completed"
            );
        })
    })
}
