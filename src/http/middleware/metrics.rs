//! Metrics middleware.
//!
//! Records request count and latency labelled by method, status and the
//! matched pattern (never the raw path, to keep label cardinality bounded).

use std::time::Instant;

use crate::http::middleware::chain::from_fn;
use crate::http::request::RequestExt;
use crate::observability::metrics::record_request;
use crate::routing::handler::BoxHandler;

pub fn metrics() -> impl Fn(BoxHandler) -> BoxHandler + Send + Sync + 'static {
    from_fn(|w, req, next| {
        Box::pin(async move {
            let start = Instant::now();
            let method = req.method().to_string();

            // The pattern is only known once the router has matched, which
            // happens before middleware of the same router runs.
            let pattern = req.matched_pattern().unwrap_or_default().to_string();

            next.run(w, req).await;

            record_request(&method, w.status().as_u16(), &pattern, start);
        })
    })
}
