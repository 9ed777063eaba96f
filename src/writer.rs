//! # Response Writer
//!
//! [`ResponseWriter`] sits between handlers and the transport's
//! [`ResponseSink`]. It holds pending headers until the status line is
//! committed, keeps the first committed status (later attempts are logged
//! and dropped), and counts body bytes.
//!
//! Transports implement [`ResponseSink`]. Only the head and body methods are
//! required; `flush`, `hijack` and `push` default to
//! [`io::ErrorKind::Unsupported`] so handlers can probe for them.

use http::{HeaderMap, Response, StatusCode};
use parking_lot::Mutex;
use std::io::{self, Read, Write};
use std::mem;
use std::sync::Arc;
use tracing::warn;

/// A connection taken over from the transport, e.g. after a protocol upgrade.
pub trait Upgraded: Read + Write + Send {}

impl<T: Read + Write + Send> Upgraded for T {}

/// The transport side of a response.
pub trait ResponseSink: Send {
    /// Emit the status line and headers. Called at most once per response.
    fn send_head(&mut self, status: StatusCode, headers: &HeaderMap) -> io::Result<()>;

    fn send_body(&mut self, chunk: &[u8]) -> io::Result<()>;

    /// Push buffered bytes to the client now.
    fn flush(&mut self) -> io::Result<()> {
        Err(unsupported("flush"))
    }

    /// Hand the raw connection to the caller.
    fn hijack(&mut self) -> io::Result<Box<dyn Upgraded>> {
        Err(unsupported("hijack"))
    }

    /// Server push of `target` (HTTP/2 only).
    fn push(&mut self, target: &str, headers: &HeaderMap) -> io::Result<()> {
        let _ = (target, headers);
        Err(unsupported("push"))
    }
}

fn unsupported(capability: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        format!("response sink does not support {capability}"),
    )
}

fn detached() -> io::Error {
    io::Error::new(
        io::ErrorKind::NotConnected,
        "response writer has no sink attached",
    )
}

/// First-write-wins wrapper around a [`ResponseSink`].
pub struct ResponseWriter {
    sink: Option<Box<dyn ResponseSink>>,
    headers: HeaderMap,
    status: StatusCode,
    committed: bool,
    hijacked: bool,
    size: usize,
}

impl Default for ResponseWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseWriter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sink: None,
            headers: HeaderMap::new(),
            status: StatusCode::OK,
            committed: false,
            hijacked: false,
            size: 0,
        }
    }

    pub(crate) fn attach(&mut self, sink: Box<dyn ResponseSink>) {
        self.reset();
        self.sink = Some(sink);
    }

    pub(crate) fn reset(&mut self) {
        self.sink = None;
        self.headers.clear();
        self.status = StatusCode::OK;
        self.committed = false;
        self.hijacked = false;
        self.size = 0;
    }

    /// Headers that will be sent with the status line.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Changes after the status line is committed never reach the wire.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Committed status, or `200 OK` while nothing has been written.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Body bytes handed to the sink so far.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether the status line has been committed.
    #[must_use]
    pub fn written(&self) -> bool {
        self.committed
    }

    #[must_use]
    pub fn hijacked(&self) -> bool {
        self.hijacked
    }

    /// Commit the status line. Only the first call has any effect.
    pub fn write_header(&mut self, status: StatusCode) -> io::Result<()> {
        if self.committed {
            warn!(
                committed = self.status.as_u16(),
                attempted = status.as_u16(),
                "superfluous write_header call ignored"
            );
            return Ok(());
        }
        let sink = self.sink.as_mut().ok_or_else(detached)?;
        self.status = status;
        self.committed = true;
        sink.send_head(status, &self.headers)
    }

    /// Write body bytes, committing `200 OK` first if needed.
    pub fn write(&mut self, chunk: &[u8]) -> io::Result<usize> {
        if self.hijacked {
            return Err(io::Error::other("connection has been hijacked"));
        }
        if !self.committed {
            self.write_header(StatusCode::OK)?;
        }
        let sink = self.sink.as_mut().ok_or_else(detached)?;
        sink.send_body(chunk)?;
        self.size += chunk.len();
        Ok(chunk.len())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        if !self.committed {
            self.write_header(StatusCode::OK)?;
        }
        self.sink.as_mut().ok_or_else(detached)?.flush()
    }

    /// Take over the underlying connection. The writer is unusable afterwards.
    pub fn hijack(&mut self) -> io::Result<Box<dyn Upgraded>> {
        let sink = self.sink.as_mut().ok_or_else(detached)?;
        let conn = sink.hijack()?;
        self.hijacked = true;
        self.committed = true;
        Ok(conn)
    }

    pub fn push(&mut self, target: &str, headers: &HeaderMap) -> io::Result<()> {
        self.sink
            .as_mut()
            .ok_or_else(detached)?
            .push(target, headers)
    }
}

#[derive(Default)]
struct Buffered {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: Vec<u8>,
    flushes: usize,
}

/// In-memory sink. Clones share the same buffer, so a transport (or test)
/// can keep one handle and give the other to [`Router::serve`](crate::Router::serve).
#[derive(Clone, Default)]
pub struct BufferedResponse {
    inner: Arc<Mutex<Buffered>>,
}

impl BufferedResponse {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn flush_count(&self) -> usize {
        self.inner.lock().flushes
    }

    /// Drain everything written so far into an `http::Response`.
    #[must_use]
    pub fn take_response(&self) -> Response<Vec<u8>> {
        let buffered = mem::take(&mut *self.inner.lock());
        let mut response = Response::new(buffered.body);
        *response.status_mut() = buffered.status.unwrap_or(StatusCode::OK);
        *response.headers_mut() = buffered.headers;
        response
    }
}

impl ResponseSink for BufferedResponse {
    fn send_head(&mut self, status: StatusCode, headers: &HeaderMap) -> io::Result<()> {
        let mut inner = self.inner.lock();
        inner.status = Some(status);
        inner.headers = headers.clone();
        Ok(())
    }

    fn send_body(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.inner.lock().body.extend_from_slice(chunk);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.lock().flushes += 1;
        Ok(())
    }
}
