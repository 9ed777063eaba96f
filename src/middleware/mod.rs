//! # Middleware
//!
//! Built-in chain elements. Each is a [`Handler`](crate::Handler) that does
//! its work around a call to [`Context::next`](crate::Context::next):
//!
//! - [`RecoveryMiddleware`] turns a panic further down the chain into a 500
//! - [`TracingMiddleware`] opens a `request` span and logs completion
//! - [`MetricsMiddleware`] counts requests, errors and latency
//! - [`AuthMiddleware`] rejects requests without the expected credentials
//! - [`RequestIdMiddleware`] tags requests and responses with an id
//! - [`HeadersMiddleware`] adds fixed response headers
//!
//! Register them with [`Router::use_middleware`](crate::Router::use_middleware)
//! or pass them as route/group middleware via [`from_fn`] or `Arc::new`.

mod auth;
mod headers;
mod metrics;
mod recovery;
mod request_id;
mod tracing;

pub use auth::{AuthMiddleware, AUTHENTICATED_KEY};
pub use headers::HeadersMiddleware;
pub use metrics::MetricsMiddleware;
pub use recovery::RecoveryMiddleware;
pub use request_id::{RequestIdMiddleware, REQUEST_ID_HEADER, REQUEST_ID_KEY};
pub use tracing::TracingMiddleware;

use crate::context::Context;
use crate::handler::{HandlerResult, Middleware};
use std::sync::Arc;

/// Wrap a closure as route or group middleware.
pub fn from_fn<F>(f: F) -> Middleware
where
    F: Fn(&mut Context) -> HandlerResult + Send + Sync + 'static,
{
    Arc::new(f)
}
