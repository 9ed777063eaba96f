//! Recycling of [`Context`] values between requests.

use super::Context;
use parking_lot::Mutex;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Bounded free-list of contexts.
///
/// Checkout hands out a reset context (a fresh one when the list is empty);
/// dropping the [`PooledContext`] resets it and returns it, keeping at most
/// `capacity` idle contexts around.
pub struct ContextPool {
    idle: Mutex<Vec<Box<Context>>>,
    capacity: usize,
    max_multipart_bytes: usize,
    created: AtomicUsize,
}

impl ContextPool {
    #[must_use]
    pub fn new(capacity: usize, max_multipart_bytes: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::with_capacity(capacity.min(64))),
            capacity,
            max_multipart_bytes,
            created: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn checkout(&self) -> PooledContext<'_> {
        let recycled = self.idle.lock().pop();
        let ctx = recycled.unwrap_or_else(|| {
            self.created.fetch_add(1, Ordering::Relaxed);
            Box::new(Context::new(self.max_multipart_bytes))
        });
        PooledContext {
            ctx: Some(ctx),
            pool: self,
        }
    }

    fn release(&self, mut ctx: Box<Context>) {
        ctx.reset();
        let mut idle = self.idle.lock();
        if idle.len() < self.capacity {
            idle.push(ctx);
        }
    }

    /// Contexts currently waiting for reuse.
    #[must_use]
    pub fn idle(&self) -> usize {
        self.idle.lock().len()
    }

    /// Contexts allocated since the pool was built.
    #[must_use]
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }
}

/// A checked-out context. Returned to its pool exactly once, on drop,
/// including when a handler panic unwinds through the dispatcher.
pub struct PooledContext<'p> {
    ctx: Option<Box<Context>>,
    pool: &'p ContextPool,
}

impl Deref for PooledContext<'_> {
    type Target = Context;

    #[allow(clippy::expect_used)]
    fn deref(&self) -> &Context {
        self.ctx.as_deref().expect("context is present until drop")
    }
}

impl DerefMut for PooledContext<'_> {
    #[allow(clippy::expect_used)]
    fn deref_mut(&mut self) -> &mut Context {
        self.ctx
            .as_deref_mut()
            .expect("context is present until drop")
    }
}

impl Drop for PooledContext<'_> {
    fn drop(&mut self) {
        if let Some(ctx) = self.ctx.take() {
            self.pool.release(ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contexts_are_reused() {
        let pool = ContextPool::new(4, 1024);
        {
            let mut ctx = pool.checkout();
            ctx.set("k", 1_u32);
        }
        assert_eq!(pool.idle(), 1);
        let ctx = pool.checkout();
        assert!(ctx.get::<u32>("k").is_none());
        assert_eq!(pool.created(), 1);
    }

    #[test]
    fn test_capacity_bounds_idle_list() {
        let pool = ContextPool::new(1, 1024);
        let a = pool.checkout();
        let b = pool.checkout();
        drop(a);
        drop(b);
        assert_eq!(pool.idle(), 1);
        assert_eq!(pool.created(), 2);
    }

    #[test]
    fn test_returned_during_unwind() {
        let pool = ContextPool::new(4, 1024);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ctx = pool.checkout();
            panic!("handler blew up");
        }));
        assert!(result.is_err());
        assert_eq!(pool.idle(), 1);
    }
}
