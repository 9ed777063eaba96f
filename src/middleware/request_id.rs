use crate::context::Context;
use crate::handler::{Handler, HandlerResult};
use crate::ids::RequestId;
use http::HeaderValue;
use tracing::debug;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
/// Context key holding the request's [`RequestId`].
pub const REQUEST_ID_KEY: &str = "request_id";

/// Reuses a valid incoming `X-Request-Id` or mints a ULID, stores it in the
/// context and echoes it on the response.
pub struct RequestIdMiddleware;

impl Handler for RequestIdMiddleware {
    fn call(&self, ctx: &mut Context) -> HandlerResult {
        let id = RequestId::from_header_or_new(ctx.header(REQUEST_ID_HEADER));
        debug!(request_id = %id, path = %ctx.path(), "request id assigned");
        ctx.writer_mut()
            .headers_mut()
            .insert(REQUEST_ID_HEADER, HeaderValue::from_str(&id.to_string())?);
        ctx.set(REQUEST_ID_KEY, id);
        ctx.next()
    }
}
