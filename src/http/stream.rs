//! Engine-backed response writer.
//!
//! # Responsibilities
//! - Hand the response head to the transport when the handler commits
//! - Buffer body bytes and forward them as frames over a bounded channel
//! - Expose the connection upgrade as `Hijacker`
//!
//! # Design Decisions
//! - The handler runs on its own task; the transport awaits only the head,
//!   so streamed bodies reach the client while the handler is still writing
//! - The bounded frame channel gives backpressure to fast writers
//! - Headers changed after commit are not sent
//! - Push is not supported (hyper implements no server push)
//! - A handler panic before commit becomes a 500; after commit an error frame
//!   aborts the body so the client never sees a truncated response as complete

use std::any::Any;
use std::io;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::FutureExt;
use hyper::upgrade::OnUpgrade;
use tokio::sync::{mpsc, oneshot};

use crate::config::HttpConfig;
use crate::error::{Error, Result};
use crate::http::response::{Flusher, Hijacked, Hijacker, ResponseState, ResponseWriter};
use crate::routing::router::Router;

/// Status line and headers, sent once per response.
#[derive(Debug)]
pub struct Head {
    pub status: StatusCode,
    pub headers: HeaderMap,
}

/// Body chunk, or the error that aborts the body.
pub type Frame = io::Result<Bytes>;

pub struct StreamWriter {
    headers: HeaderMap,
    head_tx: Option<oneshot::Sender<Head>>,
    body_tx: Option<mpsc::Sender<Frame>>,
    buf: Vec<u8>,
    buf_limit: usize,
    upgrade: Option<OnUpgrade>,
    hijacked: bool,
}

impl StreamWriter {
    pub fn new(
        head_tx: oneshot::Sender<Head>,
        body_tx: mpsc::Sender<Frame>,
        buf_limit: usize,
        upgrade: Option<OnUpgrade>,
    ) -> Self {
        Self {
            headers: HeaderMap::new(),
            head_tx: Some(head_tx),
            body_tx: Some(body_tx),
            buf: Vec::with_capacity(buf_limit),
            buf_limit: buf_limit.max(1),
            upgrade,
            hijacked: false,
        }
    }

    async fn send_buffered(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let Some(tx) = &self.body_tx else {
            return Err(hijacked_io());
        };

        let frame = Bytes::from(std::mem::take(&mut self.buf));
        tx.send(Ok(frame))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "client went away"))
    }
}

fn hijacked_io() -> io::Error {
    io::Error::other(Error::Hijacked)
}

#[async_trait]
impl ResponseWriter for StreamWriter {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_header(&mut self, status: StatusCode) {
        let Some(tx) = self.head_tx.take() else {
            return;
        };
        let head = Head {
            status,
            headers: self.headers.clone(),
        };
        if tx.send(head).is_err() {
            tracing::debug!(status = status.as_u16(), "Transport dropped before head was sent");
        }
    }

    async fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.hijacked {
            return Err(hijacked_io());
        }
        if self.head_tx.is_some() {
            self.write_header(StatusCode::OK);
        }

        self.buf.extend_from_slice(buf);
        if self.buf.len() >= self.buf_limit {
            self.send_buffered().await?;
        }
        Ok(buf.len())
    }

    fn as_flusher(&mut self) -> Option<&mut dyn Flusher> {
        Some(self)
    }

    fn as_hijacker(&mut self) -> Option<&mut dyn Hijacker> {
        if self.upgrade.is_some() || self.hijacked {
            Some(self)
        } else {
            None
        }
    }
}

#[async_trait]
impl Flusher for StreamWriter {
    async fn flush(&mut self) -> io::Result<()> {
        if self.hijacked {
            return Ok(());
        }
        self.send_buffered().await
    }
}

impl Hijacker for StreamWriter {
    fn hijack(&mut self) -> Result<Hijacked> {
        let upgrade = self.upgrade.take().ok_or(Error::Hijacked)?;
        self.hijacked = true;
        self.body_tx = None;
        self.buf.clear();
        Ok(Hijacked::new(upgrade))
    }
}

/// Run `router` for `req` on a fresh task and turn its output into a response.
pub async fn serve(router: Arc<Router>, mut req: Request<Body>, config: &HttpConfig) -> Response {
    let upgrade = req.extensions_mut().remove::<OnUpgrade>();
    let (head_tx, head_rx) = oneshot::channel();
    let (body_tx, body_rx) = mpsc::channel(config.body_channel_capacity.max(1));
    let abort_tx = body_tx.clone();
    let writer = StreamWriter::new(head_tx, body_tx, config.body_buffer_bytes, upgrade);

    tokio::spawn(async move {
        let mut state = ResponseState::new(Box::new(writer));
        let dispatched = AssertUnwindSafe(router.dispatch(&mut state, req))
            .catch_unwind()
            .await;

        match dispatched {
            Ok(()) => {
                if let Err(e) = state.finish().await {
                    tracing::debug!(
                        error = %e,
                        status = state.status().as_u16(),
                        "Response not completed"
                    );
                }
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref()).to_string();
                tracing::error!(
                    committed = state.committed(),
                    status = state.status().as_u16(),
                    panic = %message,
                    "Handler panicked"
                );
                if state.committed() {
                    let err = io::Error::new(io::ErrorKind::ConnectionAborted, "handler panicked");
                    let _ = abort_tx.send(Err(err)).await;
                }
            }
        }
    });

    let Ok(head) = head_rx.await else {
        tracing::error!("Handler exited without producing a response");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };

    let body = if head.status == StatusCode::SWITCHING_PROTOCOLS {
        Body::empty()
    } else {
        Body::from_stream(futures_util::stream::unfold(body_rx, |mut rx| async move {
            rx.recv().await.map(|frame| (frame, rx))
        }))
    };

    let mut response = Response::new(body);
    *response.status_mut() = head.status;
    *response.headers_mut() = head.headers;
    response
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
