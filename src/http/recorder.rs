//! In-memory response writer.
//!
//! Records everything a handler writes so it can be inspected afterwards.
//! Supports flushing; hijack and push are reported as unsupported.

use std::io;

use async_trait::async_trait;
use axum::http::{HeaderMap, StatusCode};

use crate::http::response::{Flusher, ResponseWriter};

#[derive(Debug, Default)]
pub struct ResponseRecorder {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: Vec<u8>,
    header_writes: usize,
    flushes: usize,
}

impl ResponseRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Status sent to the writer, 200 if none was sent.
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Number of header-writes that reached this writer.
    pub fn header_writes(&self) -> usize {
        self.header_writes
    }

    pub fn flushes(&self) -> usize {
        self.flushes
    }
}

#[async_trait]
impl ResponseWriter for ResponseRecorder {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_header(&mut self, status: StatusCode) {
        self.header_writes += 1;
        if self.status.is_none() {
            self.status = Some(status);
        }
    }

    async fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.status.is_none() {
            self.write_header(StatusCode::OK);
        }
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn as_flusher(&mut self) -> Option<&mut dyn Flusher> {
        Some(self)
    }
}

#[async_trait]
impl Flusher for ResponseRecorder {
    async fn flush(&mut self) -> io::Result<()> {
        self.flushes += 1;
        Ok(())
    }
}
