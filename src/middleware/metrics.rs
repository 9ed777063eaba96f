use crate::context::Context;
use crate::handler::{Handler, HandlerResult};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Default)]
struct Counters {
    request_count: AtomicUsize,
    error_count: AtomicUsize,
    not_found_count: AtomicUsize,
    total_latency_ns: AtomicU64,
}

/// Request counters kept with relaxed atomics.
///
/// Cloning is cheap and clones share counters: register one clone with the
/// router and read from another.
///
/// Errors are requests whose handler returned `Err` or whose response
/// status is 5xx.
#[derive(Clone, Default)]
pub struct MetricsMiddleware {
    counters: Arc<Counters>,
}

impl MetricsMiddleware {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn request_count(&self) -> usize {
        self.counters.request_count.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn error_count(&self) -> usize {
        self.counters.error_count.load(Ordering::Relaxed)
    }

    /// Requests that reached the not-found handler.
    #[must_use]
    pub fn not_found_count(&self) -> usize {
        self.counters.not_found_count.load(Ordering::Relaxed)
    }

    /// Mean time spent in the rest of the chain; zero before any request.
    #[must_use]
    pub fn average_latency(&self) -> Duration {
        let count = self.request_count() as u64;
        if count == 0 {
            Duration::from_nanos(0)
        } else {
            Duration::from_nanos(self.counters.total_latency_ns.load(Ordering::Relaxed) / count)
        }
    }
}

impl Handler for MetricsMiddleware {
    fn call(&self, ctx: &mut Context) -> HandlerResult {
        let started = Instant::now();
        let result = ctx.next();
        let c = &self.counters;
        c.total_latency_ns
            .fetch_add(started.elapsed().as_nanos() as u64, Ordering::Relaxed);
        c.request_count.fetch_add(1, Ordering::Relaxed);
        if result.is_err() || ctx.status().is_server_error() {
            c.error_count.fetch_add(1, Ordering::Relaxed);
        }
        if ctx.route().is_none() {
            c.not_found_count.fetch_add(1, Ordering::Relaxed);
        }
        result
    }
}
