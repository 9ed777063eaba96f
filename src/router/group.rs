//! Route registration surface shared by [`Router`] and [`RouterGroup`].

use super::core::Router;
use crate::error::RouteError;
use crate::handler::{Handler, Middleware};
use crate::static_files::{StaticFiles, FILEPATH_PARAM};
use http::Method;
use std::path::PathBuf;
use std::sync::Arc;

/// Anything routes can be registered on.
///
/// `middleware` runs after any global and group middleware, in slice order,
/// and before `handler`.
pub trait Registrar {
    fn handle(
        &mut self,
        method: Method,
        pattern: &str,
        handler: impl Handler,
        middleware: &[Middleware],
    ) -> Result<(), RouteError>;

    /// Derived registrar: `prefix` is prepended to every pattern and
    /// `middleware` to every chain registered through it.
    fn group(&mut self, prefix: &str, middleware: &[Middleware]) -> RouterGroup<'_>;

    fn get(
        &mut self,
        pattern: &str,
        handler: impl Handler,
        middleware: &[Middleware],
    ) -> Result<(), RouteError> {
        self.handle(Method::GET, pattern, handler, middleware)
    }

    fn post(
        &mut self,
        pattern: &str,
        handler: impl Handler,
        middleware: &[Middleware],
    ) -> Result<(), RouteError> {
        self.handle(Method::POST, pattern, handler, middleware)
    }

    fn put(
        &mut self,
        pattern: &str,
        handler: impl Handler,
        middleware: &[Middleware],
    ) -> Result<(), RouteError> {
        self.handle(Method::PUT, pattern, handler, middleware)
    }

    fn delete(
        &mut self,
        pattern: &str,
        handler: impl Handler,
        middleware: &[Middleware],
    ) -> Result<(), RouteError> {
        self.handle(Method::DELETE, pattern, handler, middleware)
    }

    fn patch(
        &mut self,
        pattern: &str,
        handler: impl Handler,
        middleware: &[Middleware],
    ) -> Result<(), RouteError> {
        self.handle(Method::PATCH, pattern, handler, middleware)
    }

    fn head(
        &mut self,
        pattern: &str,
        handler: impl Handler,
        middleware: &[Middleware],
    ) -> Result<(), RouteError> {
        self.handle(Method::HEAD, pattern, handler, middleware)
    }

    fn options(
        &mut self,
        pattern: &str,
        handler: impl Handler,
        middleware: &[Middleware],
    ) -> Result<(), RouteError> {
        self.handle(Method::OPTIONS, pattern, handler, middleware)
    }

    /// Serve files under `root` at `{prefix}/*filepath` for GET and HEAD.
    fn static_files(&mut self, prefix: &str, root: impl Into<PathBuf>) -> Result<(), RouteError> {
        let files = StaticFiles::new(root);
        let pattern = join_paths(prefix, &format!("/*{FILEPATH_PARAM}"));
        self.handle(Method::GET, &pattern, files.clone(), &[])?;
        self.handle(Method::HEAD, &pattern, files, &[])
    }
}

/// A prefix plus middleware, borrowed from the owning [`Router`].
pub struct RouterGroup<'r> {
    router: &'r mut Router,
    prefix: String,
    middleware: Vec<Middleware>,
}

impl<'r> RouterGroup<'r> {
    pub(crate) fn new(router: &'r mut Router, prefix: String, middleware: Vec<Middleware>) -> Self {
        Self {
            router,
            prefix,
            middleware,
        }
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Append middleware for routes registered on this group from now on.
    pub fn use_middleware(&mut self, middleware: impl Handler) {
        self.middleware.push(Arc::new(middleware));
    }
}

impl Registrar for RouterGroup<'_> {
    fn handle(
        &mut self,
        method: Method,
        pattern: &str,
        handler: impl Handler,
        middleware: &[Middleware],
    ) -> Result<(), RouteError> {
        let full = join_paths(&self.prefix, pattern);
        let chain: Vec<Middleware> = self.middleware.iter().chain(middleware).cloned().collect();
        self.router.add_route(method, &full, &chain, Arc::new(handler))
    }

    fn group(&mut self, prefix: &str, middleware: &[Middleware]) -> RouterGroup<'_> {
        let prefix = join_paths(&self.prefix, prefix);
        let middleware = self.middleware.iter().chain(middleware).cloned().collect();
        RouterGroup::new(&mut *self.router, prefix, middleware)
    }
}

/// Concatenate two path pieces, collapsing runs of `/` into one.
pub(crate) fn join_paths(prefix: &str, path: &str) -> String {
    let mut joined = String::with_capacity(prefix.len() + path.len());
    for c in prefix.chars().chain(path.chars()) {
        if c == '/' && joined.ends_with('/') {
            continue;
        }
        joined.push(c);
    }
    joined
}
