//! Response capture.
//!
//! # Responsibilities
//! - Define the sink contract handlers write through (`ResponseWriter`)
//! - Track status, body size and commit state per request (`ResponseState`)
//! - Forward optional transport capabilities: flush, hijack, push
//!
//! # Design Decisions
//! - The first header-write (explicit or implied by a body write) commits
//! - Later header-writes are logged no-ops, never errors
//! - Flush on a sink without flush support panics; hijack and push return
//!   `Error::Unsupported` instead
//! - Wrapping a `ResponseState` again yields the same state

use std::any::Any;
use std::io;

use async_trait::async_trait;
use axum::http::{HeaderMap, Method, StatusCode};
use hyper::upgrade::{OnUpgrade, Upgraded};
use hyper_util::rt::TokioIo;

use crate::error::{Capability, Error, Result};

/// Output sink for a single response.
///
/// Capabilities are discovered through the `as_*` queries; the defaults
/// report no support.
#[async_trait]
pub trait ResponseWriter: Any + Send {
    fn headers(&self) -> &HeaderMap;

    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Send the response head with `status`.
    fn write_header(&mut self, status: StatusCode);

    /// Write body bytes, returning how many the sink accepted.
    async fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    fn as_flusher(&mut self) -> Option<&mut dyn Flusher> {
        None
    }

    fn as_hijacker(&mut self) -> Option<&mut dyn Hijacker> {
        None
    }

    fn as_pusher(&mut self) -> Option<&mut dyn Pusher> {
        None
    }

    /// Concrete type name, used in capability errors.
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Sends buffered body bytes to the client immediately.
#[async_trait]
pub trait Flusher: Send {
    async fn flush(&mut self) -> io::Result<()>;
}

/// Takes over the underlying connection.
pub trait Hijacker: Send {
    fn hijack(&mut self) -> Result<Hijacked>;
}

/// Initiates a server push for `target`.
#[async_trait]
pub trait Pusher: Send {
    async fn push(&mut self, target: &str, opts: &PushOptions) -> Result<()>;
}

/// Options for a server push.
#[derive(Debug, Clone)]
pub struct PushOptions {
    pub method: Method,
    pub headers: HeaderMap,
}

impl Default for PushOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            headers: HeaderMap::new(),
        }
    }
}

/// A connection taken over from the HTTP layer.
///
/// The upgrade completes once the `101 Switching Protocols` head has been
/// sent, so write the head before awaiting [`Hijacked::connection`].
pub struct Hijacked {
    upgrade: OnUpgrade,
}

impl Hijacked {
    pub fn new(upgrade: OnUpgrade) -> Self {
        Self { upgrade }
    }

    /// Wait for the upgrade and return the raw connection.
    pub async fn connection(self) -> Result<TokioIo<Upgraded>> {
        self.upgrade
            .await
            .map(TokioIo::new)
            .map_err(|e| Error::from(io::Error::other(e)))
    }
}

/// Per-request capture of status, size and commit state.
pub struct ResponseState {
    inner: Box<dyn ResponseWriter>,
    status: StatusCode,
    size: u64,
    committed: bool,
}

impl ResponseState {
    /// Wrap `writer`, or return it unchanged if it already is a `ResponseState`.
    pub fn new(writer: Box<dyn ResponseWriter>) -> Self {
        if (&*writer as &dyn Any).is::<ResponseState>() {
            let writer: Box<dyn Any> = writer;
            match writer.downcast::<ResponseState>() {
                Ok(existing) => return *existing,
                Err(_) => unreachable!("writer type checked above"),
            }
        }

        Self {
            inner: writer,
            status: StatusCode::OK,
            size: 0,
            committed: false,
        }
    }

    /// Recorded status; 200 until a header-write says otherwise.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Body bytes accepted by the underlying writer.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn committed(&self) -> bool {
        self.committed
    }

    pub fn get_ref(&self) -> &dyn ResponseWriter {
        self.inner.as_ref()
    }

    pub fn get_mut(&mut self) -> &mut dyn ResponseWriter {
        self.inner.as_mut()
    }

    pub fn into_inner(self) -> Box<dyn ResponseWriter> {
        self.inner
    }

    /// Borrow the underlying writer as its concrete type.
    pub fn downcast_ref<W: ResponseWriter>(&self) -> Option<&W> {
        (self.inner.as_ref() as &dyn Any).downcast_ref::<W>()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        self.inner.headers_mut()
    }

    /// Record `status` and commit. Ignored (and logged) once committed.
    pub fn write_header(&mut self, status: StatusCode) {
        if self.committed {
            tracing::warn!(
                status = status.as_u16(),
                committed_status = self.status.as_u16(),
                "attempt to write header after response committed"
            );
            return;
        }

        self.status = status;
        self.committed = true;
        self.inner.write_header(status);
    }

    /// Write body bytes, committing with the current status first if needed.
    pub async fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.committed {
            self.write_header(self.status);
        }

        let written = self.inner.write(buf).await?;
        self.size += written as u64;
        Ok(written)
    }

    /// Write the whole buffer, retrying partial writes.
    pub async fn write_all(&mut self, mut buf: &[u8]) -> io::Result<()> {
        if buf.is_empty() {
            self.write(buf).await?;
            return Ok(());
        }
        while !buf.is_empty() {
            let n = self.write(buf).await?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "response writer accepted no bytes",
                ));
            }
            buf = &buf[n..];
        }
        Ok(())
    }

    /// Flush buffered body bytes to the client.
    ///
    /// # Panics
    ///
    /// Panics if the underlying writer cannot flush.
    pub async fn flush(&mut self) -> io::Result<()> {
        if self.inner.as_flusher().is_none() {
            panic!(
                "response writer {} does not support {}",
                self.inner.type_name(),
                Capability::Flush
            );
        }
        if !self.committed {
            self.write_header(self.status);
        }
        match self.inner.as_flusher() {
            Some(flusher) => flusher.flush().await,
            None => Ok(()),
        }
    }

    /// Take over the connection, if the writer allows it.
    pub fn hijack(&mut self) -> Result<Hijacked> {
        let writer = self.inner.type_name();
        match self.inner.as_hijacker() {
            Some(hijacker) => hijacker.hijack(),
            None => Err(Error::Unsupported {
                writer,
                capability: Capability::Hijack,
            }),
        }
    }

    /// Push `target` to the client, if the writer allows it.
    pub async fn push(&mut self, target: &str, opts: &PushOptions) -> Result<()> {
        let writer = self.inner.type_name();
        match self.inner.as_pusher() {
            Some(pusher) => pusher.push(target, opts).await,
            None => Err(Error::Unsupported {
                writer,
                capability: Capability::Push,
            }),
        }
    }

    /// Complete the response after the handler returned.
    ///
    /// Commits with 200 if nothing was written, then flushes when the writer
    /// supports it.
    pub async fn finish(&mut self) -> io::Result<()> {
        if !self.committed {
            self.write_header(self.status);
        }
        match self.inner.as_flusher() {
            Some(flusher) => flusher.flush().await,
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ResponseWriter for ResponseState {
    fn headers(&self) -> &HeaderMap {
        ResponseState::headers(self)
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        ResponseState::headers_mut(self)
    }

    fn write_header(&mut self, status: StatusCode) {
        ResponseState::write_header(self, status)
    }

    async fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        ResponseState::write(self, buf).await
    }

    fn as_flusher(&mut self) -> Option<&mut dyn Flusher> {
        Some(self)
    }

    fn as_hijacker(&mut self) -> Option<&mut dyn Hijacker> {
        Some(self)
    }

    fn as_pusher(&mut self) -> Option<&mut dyn Pusher> {
        Some(self)
    }
}

#[async_trait]
impl Flusher for ResponseState {
    async fn flush(&mut self) -> io::Result<()> {
        ResponseState::flush(self).await
    }
}

impl Hijacker for ResponseState {
    fn hijack(&mut self) -> Result<Hijacked> {
        ResponseState::hijack(self)
    }
}

#[async_trait]
impl Pusher for ResponseState {
    async fn push(&mut self, target: &str, opts: &PushOptions) -> Result<()> {
        ResponseState::push(self, target, opts).await
    }
}
