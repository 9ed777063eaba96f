//! Handler abstraction shared by endpoints and middleware.
//!
//! Endpoints and middleware have the same shape: a function of the request
//! [`Context`]. Middleware call [`Context::next`] to run the rest of the
//! chain; a handler that never calls it ends the chain where it stands.

use crate::context::Context;
use std::sync::Arc;

/// Result of one chain element. Errors are turned into responses by the
/// router (see [`HttpError`](crate::HttpError)).
pub type HandlerResult = anyhow::Result<()>;

pub trait Handler: Send + Sync + 'static {
    fn call(&self, ctx: &mut Context) -> HandlerResult;
}

impl<F> Handler for F
where
    F: Fn(&mut Context) -> HandlerResult + Send + Sync + 'static,
{
    #[inline]
    fn call(&self, ctx: &mut Context) -> HandlerResult {
        self(ctx)
    }
}

/// A shareable chain element.
pub type Middleware = Arc<dyn Handler>;

/// The full, immutable handler list for one route: global middleware, then
/// group and route middleware, then the endpoint.
pub type HandlerChain = Arc<[Middleware]>;

pub(crate) fn compose(
    global: &[Middleware],
    route: &[Middleware],
    terminal: Middleware,
) -> HandlerChain {
    global
        .iter()
        .chain(route)
        .cloned()
        .chain(std::iter::once(terminal))
        .collect()
}
