use crate::context::Context;
use crate::handler::{Handler, HandlerResult};
use http::{HeaderName, HeaderValue};

/// Adds a fixed set of response headers before the rest of the chain runs,
/// so handlers can still override them. Also applies to not-found responses
/// when registered globally.
#[derive(Debug, Clone, Default)]
pub struct HeadersMiddleware {
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl HeadersMiddleware {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.push((name, value));
        self
    }

    /// `nosniff`, `DENY` framing and no referrer.
    #[must_use]
    pub fn secure_defaults() -> Self {
        Self::new()
            .with(
                http::header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            )
            .with(
                http::header::X_FRAME_OPTIONS,
                HeaderValue::from_static("DENY"),
            )
            .with(
                http::header::REFERRER_POLICY,
                HeaderValue::from_static("no-referrer"),
            )
    }
}

impl Handler for HeadersMiddleware {
    fn call(&self, ctx: &mut Context) -> HandlerResult {
        let headers = ctx.writer_mut().headers_mut();
        for (name, value) in &self.headers {
            headers.insert(name.clone(), value.clone());
        }
        ctx.next()
    }
}
