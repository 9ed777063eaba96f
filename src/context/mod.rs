//! # Request Context
//!
//! One [`Context`] carries a request through its handler chain: the parsed
//! request, the [`ResponseWriter`], captured path parameters, a typed
//! key/value store for middleware hand-off, and the chain cursor.
//!
//! Contexts are recycled through a [`ContextPool`]; everything is reset
//! between requests so nothing leaks from one request to the next.

mod binding;
mod pool;

pub use binding::{BindError, FormFile, MultipartForm, MIME_FORM, MIME_JSON, MIME_MULTIPART};
pub use pool::{ContextPool, PooledContext};

use crate::error::HttpError;
use crate::handler::{HandlerChain, HandlerResult};
use crate::router::Params;
use crate::static_files::StaticFiles;
use crate::writer::{ResponseSink, ResponseWriter};
use anyhow::anyhow;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::Any;
use std::cell::OnceCell;
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Requests are fully buffered before dispatch.
pub type Request = http::Request<Vec<u8>>;

/// Cursor value marking a chain that was stopped early.
const ABORT_INDEX: usize = usize::MAX / 2;

/// Peer address, set by the transport as a request extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteAddr(pub SocketAddr);

/// Cancellation signal and optional deadline for one request.
///
/// The transport inserts it as a request extension and flips it when the
/// client goes away. Long-running handlers poll [`Context::is_cancelled`].
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl Cancellation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            cancelled: Arc::default(),
            deadline: Some(deadline),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
            || self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

pub struct Context {
    request: Request,
    writer: ResponseWriter,
    params: Params,
    store: HashMap<String, Box<dyn Any + Send + Sync>>,
    chain: Option<HandlerChain>,
    index: usize,
    route: Option<Arc<str>>,
    query: OnceCell<Vec<(String, String)>>,
    form: OnceCell<Vec<(String, String)>>,
    multipart: OnceCell<MultipartForm>,
    max_multipart_bytes: usize,
}

impl Context {
    pub(crate) fn new(max_multipart_bytes: usize) -> Self {
        Self {
            request: Request::default(),
            writer: ResponseWriter::new(),
            params: Params::new(),
            store: HashMap::new(),
            chain: None,
            index: 0,
            route: None,
            query: OnceCell::new(),
            form: OnceCell::new(),
            multipart: OnceCell::new(),
            max_multipart_bytes,
        }
    }

    /// Load a fresh request into a reset context.
    pub(crate) fn prepare(&mut self, request: Request, sink: Box<dyn ResponseSink>) {
        self.reset();
        self.request = request;
        self.writer.attach(sink);
    }

    pub(crate) fn reset(&mut self) {
        self.request = Request::default();
        self.writer.reset();
        self.params.clear();
        self.store.clear();
        self.chain = None;
        self.index = 0;
        self.route = None;
        self.query.take();
        self.form.take();
        self.multipart.take();
    }

    /// Request path and parameter buffer, borrowed together for route lookup.
    pub(crate) fn route_target(&mut self) -> (&str, &mut Params) {
        (self.request.uri().path(), &mut self.params)
    }

    /// Run `chain` from its first element.
    pub(crate) fn run(&mut self, route: Option<Arc<str>>, chain: HandlerChain) -> HandlerResult {
        self.route = route;
        self.chain = Some(chain);
        self.index = 0;
        self.next()
    }

    // ---- chain control ----

    /// Run the next element of the chain. Returns once it (and everything
    /// it calls) has finished.
    pub fn next(&mut self) -> HandlerResult {
        let Some(chain) = self.chain.as_ref().map(Arc::clone) else {
            return Ok(());
        };
        let Some(handler) = chain.get(self.index) else {
            return Ok(());
        };
        self.index += 1;
        handler.call(self)
    }

    /// Stop the chain: no element after the current one will run.
    pub fn abort(&mut self) {
        self.index = ABORT_INDEX;
    }

    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.index >= ABORT_INDEX
    }

    /// Write `{"error": message}` with `status`, then abort.
    pub fn abort_with_error(&mut self, status: StatusCode, message: &str) -> HandlerResult {
        self.abort();
        self.error(status, message)
    }

    // ---- request accessors ----

    #[must_use]
    pub fn request(&self) -> &Request {
        &self.request
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        self.request.method()
    }

    #[must_use]
    pub fn uri(&self) -> &Uri {
        self.request.uri()
    }

    #[must_use]
    pub fn path(&self) -> &str {
        self.request.uri().path()
    }

    /// Pattern of the matched route, `None` on the not-found chain.
    #[must_use]
    pub fn route(&self) -> Option<&str> {
        self.route.as_deref()
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        self.request.headers()
    }

    /// Header value, if present and visible ASCII.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.request.headers().get(name)?.to_str().ok()
    }

    #[must_use]
    pub fn body(&self) -> &[u8] {
        self.request.body()
    }

    /// Media type without parameters, e.g. `application/json`.
    #[must_use]
    pub fn content_type(&self) -> &str {
        self.header(CONTENT_TYPE.as_str())
            .and_then(|ct| ct.split(';').next())
            .map_or("", str::trim)
    }

    /// Percent-decoded value of the path parameter `name`.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    #[must_use]
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// First query-string value for `name`.
    #[must_use]
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query_pairs()
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn query_pairs(&self) -> &[(String, String)] {
        self.query.get_or_init(|| {
            binding::parse_urlencoded(self.request.uri().query().unwrap_or("").as_bytes())
        })
    }

    /// Client address: first `X-Forwarded-For` hop, then `X-Real-IP`, then
    /// the transport's [`RemoteAddr`].
    #[must_use]
    pub fn client_ip(&self) -> Option<IpAddr> {
        let forwarded: Option<IpAddr> = self
            .header("x-forwarded-for")
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse().ok());
        forwarded
            .or_else(|| self.header("x-real-ip").and_then(|v| v.trim().parse().ok()))
            .or_else(|| {
                self.request
                    .extensions()
                    .get::<RemoteAddr>()
                    .map(|addr| addr.0.ip())
            })
    }

    #[must_use]
    pub fn cancellation(&self) -> Option<&Cancellation> {
        self.request.extensions().get::<Cancellation>()
    }

    /// Whether the client went away or the deadline passed.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation().is_some_and(Cancellation::is_cancelled)
    }

    // ---- key/value store ----

    pub fn set<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.store.insert(key.into(), Box::new(value));
    }

    /// Stored value under `key`, if present with type `T`.
    #[must_use]
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.store.get(key)?.downcast_ref()
    }

    /// Like [`get`](Self::get) but panics when the key is absent or has a
    /// different type.
    #[must_use]
    #[allow(clippy::panic)]
    pub fn must_get<T: Any>(&self, key: &str) -> &T {
        match self.get(key) {
            Some(value) => value,
            None => panic!("context key \"{key}\" does not exist"),
        }
    }

    // ---- binding ----

    /// Decode the body according to its content type.
    pub fn bind<T: DeserializeOwned>(&self) -> Result<T, BindError> {
        let ct = self.content_type();
        if ct.eq_ignore_ascii_case(MIME_JSON) {
            self.bind_json()
        } else if ct.eq_ignore_ascii_case(MIME_FORM) || ct.eq_ignore_ascii_case(MIME_MULTIPART) {
            self.bind_form()
        } else {
            Err(BindError::UnsupportedContentType(ct.to_string()))
        }
    }

    pub fn bind_json<T: DeserializeOwned>(&self) -> Result<T, BindError> {
        serde_json::from_slice(self.body()).map_err(BindError::Json)
    }

    pub fn bind_query<T: DeserializeOwned>(&self) -> Result<T, BindError> {
        serde_urlencoded::from_str(self.request.uri().query().unwrap_or("")).map_err(BindError::Form)
    }

    /// Decode url-encoded or multipart text fields.
    pub fn bind_form<T: DeserializeOwned>(&self) -> Result<T, BindError> {
        if self.is_multipart() {
            let form = self.multipart_form()?;
            let encoded = serde_urlencoded::to_string(&form.values)
                .map_err(|e| BindError::Multipart(e.to_string()))?;
            serde_urlencoded::from_str(&encoded).map_err(BindError::Form)
        } else {
            serde_urlencoded::from_bytes(self.body()).map_err(BindError::Form)
        }
    }

    /// A form field from the body, falling back to the query string.
    #[must_use]
    pub fn form_value(&self, name: &str) -> Option<&str> {
        let from_body = if self.is_multipart() {
            match self.multipart_form() {
                Ok(form) => form.value(name),
                Err(err) => {
                    debug!(
                        path = %self.path(),
                        field = name,
                        error = %err,
                        "multipart body unreadable; falling back to query"
                    );
                    None
                }
            }
        } else if self.content_type().eq_ignore_ascii_case(MIME_FORM) {
            self.form
                .get_or_init(|| binding::parse_urlencoded(self.body()))
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
        } else {
            None
        };
        from_body.or_else(|| self.query(name))
    }

    pub fn form_file(&self, name: &str) -> Result<&FormFile, BindError> {
        self.multipart_form()?
            .file(name)
            .ok_or_else(|| BindError::MissingFile(name.to_string()))
    }

    /// The parsed multipart body, parsed once per request.
    pub fn multipart_form(&self) -> Result<&MultipartForm, BindError> {
        if let Some(form) = self.multipart.get() {
            return Ok(form);
        }
        if !self.is_multipart() {
            return Err(BindError::UnsupportedContentType(
                self.content_type().to_string(),
            ));
        }
        let raw_type = self.header(CONTENT_TYPE.as_str()).unwrap_or_default();
        let parsed = binding::parse_multipart(self.body(), raw_type, self.max_multipart_bytes)?;
        Ok(self.multipart.get_or_init(|| parsed))
    }

    fn is_multipart(&self) -> bool {
        self.content_type().eq_ignore_ascii_case(MIME_MULTIPART)
    }

    // ---- response ----

    #[must_use]
    pub fn writer(&self) -> &ResponseWriter {
        &self.writer
    }

    pub fn writer_mut(&mut self) -> &mut ResponseWriter {
        &mut self.writer
    }

    /// Status committed so far (`200 OK` if nothing was written).
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.writer.status()
    }

    pub fn set_header(&mut self, name: &str, value: &str) -> HandlerResult {
        let name = HeaderName::from_bytes(name.as_bytes())?;
        let value = HeaderValue::from_str(value)?;
        self.writer.headers_mut().insert(name, value);
        Ok(())
    }

    pub fn json<T: Serialize + ?Sized>(&mut self, status: StatusCode, value: &T) -> HandlerResult {
        let body = serde_json::to_vec(value)?;
        self.send(status, Some("application/json; charset=utf-8"), &body)
    }

    pub fn string(&mut self, status: StatusCode, text: &str) -> HandlerResult {
        self.send(status, Some("text/plain; charset=utf-8"), text.as_bytes())
    }

    pub fn data(
        &mut self,
        status: StatusCode,
        content_type: &str,
        body: impl AsRef<[u8]>,
    ) -> HandlerResult {
        self.send(status, Some(content_type), body.as_ref())
    }

    /// Send a file from disk; a missing file becomes a 404.
    pub fn file(&mut self, path: impl AsRef<Path>) -> HandlerResult {
        let path = path.as_ref();
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(HttpError::not_found("file not found").into());
            }
            Err(err) => return Err(err.into()),
        };
        self.send(StatusCode::OK, Some(StaticFiles::content_type(path)), &bytes)
    }

    /// Redirect with a 3xx status (or `201 Created`) to `location`.
    pub fn redirect(&mut self, status: StatusCode, location: &str) -> HandlerResult {
        if !status.is_redirection() && status != StatusCode::CREATED {
            return Err(anyhow!("cannot redirect with status code {status}"));
        }
        if self.writer.written() {
            warn!(path = %self.path(), "redirect after response was written ignored");
            return Ok(());
        }
        self.writer
            .headers_mut()
            .insert(LOCATION, HeaderValue::from_str(location)?);
        self.send(status, None, &[])
    }

    pub fn no_content(&mut self) -> HandlerResult {
        self.send(StatusCode::NO_CONTENT, None, &[])
    }

    /// JSON error body `{"error": message}`.
    pub fn error(&mut self, status: StatusCode, message: &str) -> HandlerResult {
        self.json(status, &serde_json::json!({ "error": message }))
    }

    fn send(&mut self, status: StatusCode, content_type: Option<&str>, body: &[u8]) -> HandlerResult {
        if self.writer.written() {
            warn!(
                path = %self.path(),
                committed = self.writer.status().as_u16(),
                attempted = status.as_u16(),
                "response already written; dropping second response"
            );
            return Ok(());
        }
        let headers = self.writer.headers_mut();
        if let Some(ct) = content_type {
            headers.insert(CONTENT_TYPE, HeaderValue::from_str(ct)?);
        }
        if status != StatusCode::NO_CONTENT && !status.is_informational() {
            headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
        }
        self.writer.write_header(status)?;
        if !body.is_empty() && self.request.method() != Method::HEAD {
            self.writer.write(body)?;
        }
        Ok(())
    }
}
