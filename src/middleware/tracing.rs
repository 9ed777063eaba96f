use crate::context::Context;
use crate::handler::{Handler, HandlerResult};
use std::time::Instant;
use tracing::{field, info, info_span};

/// Wraps the rest of the chain in a `request` span and logs the outcome.
pub struct TracingMiddleware;

impl Handler for TracingMiddleware {
    fn call(&self, ctx: &mut Context) -> HandlerResult {
        let span = info_span!(
            "request",
            method = %ctx.method(),
            path = %ctx.path(),
            route = field::Empty,
            status = field::Empty,
            latency_ms = field::Empty,
        );
        let _entered = span.enter();
        let started = Instant::now();

        let result = ctx.next();

        let latency = started.elapsed();
        if let Some(route) = ctx.route() {
            span.record("route", route);
        }
        span.record("status", ctx.status().as_u16());
        span.record("latency_ms", latency.as_millis() as u64);
        info!(
            status = ctx.status().as_u16(),
            latency_us = latency.as_micros() as u64,
            aborted = ctx.is_aborted(),
            failed = result.is_err(),
            "request completed"
        );
        result
    }
}
