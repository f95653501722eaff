//! Request ID middleware.
//!
//! Reuses an incoming `x-request-id` header or generates a UUID v4, stores it
//! as a [`RequestId`] extension and echoes it on the response.

use axum::http::HeaderValue;

use crate::http::middleware::chain::from_fn;
use crate::http::request::{RequestId, X_REQUEST_ID};
use crate::routing::handler::BoxHandler;

pub fn request_id() -> impl Fn(BoxHandler) -> BoxHandler + Send + Sync + 'static {
    from_fn(|w, mut req, next| {
        Box::pin(async move {
            let id = req
                .headers()
                .get(X_REQUEST_ID)
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .map(|v| RequestId(v.to_string()))
                .unwrap_or_else(RequestId::generate);

            if let Ok(value) = HeaderValue::from_str(id.as_str()) {
                w.headers_mut().insert(X_REQUEST_ID, value);
            }
            req.extensions_mut().insert(id);

            next.run(w, req).await
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use axum::body::Body;
    use axum::http::Request;

    use crate::http::middleware::chain::Chain;
    use crate::http::recorder::ResponseRecorder;
    use crate::http::request::RequestExt;
    use crate::http::response::ResponseState;
    use crate::routing::handler::handler_fn;

    async fn run(req: Request<Body>) -> (ResponseState, Option<RequestId>) {
        let seen = Arc::new(Mutex::new(None));
        let captured = seen.clone();
        let mut chain = Chain::new();
        chain.push(request_id());
        let handler = chain.then(Arc::new(handler_fn(move |_w, req| {
            let captured = captured.clone();
            Box::pin(async move {
                *captured.lock().unwrap() = req.request_id().cloned();
            })
        })));

        let mut w = ResponseState::new(Box::new(ResponseRecorder::new()));
        handler.serve(&mut w, req).await;
        let id = seen.lock().unwrap().clone();
        (w, id)
    }

    #[tokio::test]
    async fn test_generates_id_when_missing() {
        let (w, id) = run(Request::new(Body::empty())).await;
        let id = id.expect("request id extension");
        assert_eq!(w.headers()[X_REQUEST_ID], id.as_str());
    }

    #[tokio::test]
    async fn test_reuses_incoming_id() {
        let req = Request::builder()
            .header(X_REQUEST_ID, "upstream-7")
            .body(Body::empty())
            .unwrap();
        let (w, id) = run(req).await;
        assert_eq!(id, Some(RequestId("upstream-7".into())));
        assert_eq!(w.headers()[X_REQUEST_ID], "upstream-7");
    }
}
