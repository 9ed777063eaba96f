use super::group::{join_paths, Registrar, RouterGroup};
use super::tree::Tree;
use super::Params;
use crate::config::{RouterConfig, TrailingSlash};
use crate::context::{BindError, Context, ContextPool, Request};
use crate::error::{HttpError, RouteError};
use crate::handler::{compose, Handler, HandlerChain, HandlerResult, Middleware};
use crate::writer::{BufferedResponse, ResponseSink};
use http::{Method, Response, StatusCode};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// A registered route: its pattern, the group and route middleware and
/// endpoint it was registered with, and the chain composed from them.
#[derive(Clone)]
pub(crate) struct Route {
    pattern: Arc<str>,
    middleware: Vec<Middleware>,
    handler: Middleware,
    chain: HandlerChain,
}

/// Result of a diagnostic [`Router::lookup`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteLookup {
    /// Pattern the path matched, e.g. `/users/:id`.
    pub pattern: Option<String>,
    pub params: Params,
    /// The path with its trailing slash toggled is registered.
    pub trailing_slash: bool,
}

/// Summary of one served request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Served {
    pub status: StatusCode,
    /// Body bytes written.
    pub bytes: usize,
    /// Matched pattern, `None` when the not-found chain ran.
    pub route: Option<Arc<str>>,
    pub elapsed: Duration,
}

/// HTTP router: one compressed trie per method, global middleware, a
/// not-found chain and a pool of request contexts.
///
/// Build it single-threaded, then share it (`&Router` or `Arc<Router>`)
/// across however many threads the transport uses. Serving takes `&self`.
pub struct Router {
    trees: HashMap<Method, Tree<Route>>,
    middleware: Vec<Middleware>,
    not_found: Middleware,
    not_found_chain: HandlerChain,
    routes: Vec<(Method, String)>,
    config: RouterConfig,
    pool: ContextPool,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RouterConfig::default())
    }

    #[must_use]
    pub fn with_config(config: RouterConfig) -> Self {
        let body = config.not_found_body.clone();
        let not_found: Middleware = Arc::new(move |ctx: &mut Context| -> HandlerResult {
            ctx.string(StatusCode::NOT_FOUND, &body)
        });
        let pool = ContextPool::new(config.context_pool_capacity, config.max_multipart_bytes);
        Self {
            trees: HashMap::new(),
            middleware: Vec::new(),
            not_found_chain: compose(&[], &[], Arc::clone(&not_found)),
            not_found,
            routes: Vec::new(),
            config,
            pool,
        }
    }

    #[must_use]
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Append global middleware. It wraps every route, including those
    /// registered before this call, and the not-found handler.
    pub fn use_middleware(&mut self, middleware: impl Handler) {
        self.middleware.push(Arc::new(middleware));
        let global = &self.middleware;
        for route in self.trees.values_mut().flat_map(Tree::values_mut) {
            route.chain = compose(global, &route.middleware, Arc::clone(&route.handler));
        }
        self.rebuild_not_found();
    }

    /// Replace the handler run when no route matches.
    pub fn set_not_found(&mut self, handler: impl Handler) {
        self.not_found = Arc::new(handler);
        self.rebuild_not_found();
    }

    fn rebuild_not_found(&mut self) {
        self.not_found_chain = compose(&self.middleware, &[], Arc::clone(&self.not_found));
    }

    /// Every registered `(method, pattern)` in registration order.
    #[must_use]
    pub fn routes(&self) -> &[(Method, String)] {
        &self.routes
    }

    #[must_use]
    pub fn pool(&self) -> &ContextPool {
        &self.pool
    }

    pub(crate) fn add_route(
        &mut self,
        method: Method,
        pattern: &str,
        route_middleware: &[Middleware],
        handler: Middleware,
    ) -> Result<(), RouteError> {
        let chain = compose(&self.middleware, route_middleware, Arc::clone(&handler));
        let handlers = chain.len();
        let route = Route {
            pattern: Arc::from(pattern),
            middleware: route_middleware.to_vec(),
            handler,
            chain,
        };
        let tree = self.trees.entry(method.clone()).or_default();
        if let Err(err) = tree.insert(pattern, route) {
            error!(method = %method, pattern, error = %err, "route registration rejected");
            return Err(err);
        }
        info!(method = %method, pattern, handlers, "route registered");
        self.routes.push((method, pattern.to_string()));
        Ok(())
    }

    /// Resolve `path` for `method` without running anything.
    ///
    /// Applies the same trailing-slash handling as request dispatch.
    #[must_use]
    pub fn lookup(&self, method: &Method, path: &str) -> RouteLookup {
        let mut params = Params::new();
        let (route, trailing_slash) = self.resolve(method, path, &mut params);
        RouteLookup {
            pattern: route.map(|r| r.pattern.to_string()),
            params,
            trailing_slash,
        }
    }

    /// Returns the route, if any, and the trailing-slash hint.
    fn resolve(&self, method: &Method, path: &str, params: &mut Params) -> (Option<&Route>, bool) {
        let Some(tree) = self.trees.get(method) else {
            return (None, false);
        };
        let path = normalize(path);
        let found = tree.lookup(path, params);
        if found.value.is_some() || !found.trailing_slash {
            return (found.value, false);
        }
        match self.config.trailing_slash {
            TrailingSlash::Match => {
                let alternate = format!("{path}/");
                (tree.lookup(&alternate, params).value, true)
            }
            TrailingSlash::Ignore => {
                debug!(method = %method, path, "path matches only with a trailing slash; not matching");
                (None, true)
            }
        }
    }

    /// Dispatch one request, writing the response to `sink`.
    ///
    /// Handler errors become responses: an [`HttpError`] keeps its status,
    /// a [`BindError`] maps to 4xx, anything else is a 500. A handler that
    /// writes nothing yields an empty `200 OK`.
    pub fn serve(&self, request: Request, sink: Box<dyn ResponseSink>) -> Served {
        let started = Instant::now();
        let mut ctx = self.pool.checkout();
        ctx.prepare(request, sink);

        let method = ctx.method().clone();
        let route = {
            let (path, params) = ctx.route_target();
            self.resolve(&method, path, params).0
        };
        let (pattern, chain) = match route {
            Some(route) => (Some(Arc::clone(&route.pattern)), Arc::clone(&route.chain)),
            None => {
                debug!(method = %method, path = %ctx.path(), "no route matched");
                (None, Arc::clone(&self.not_found_chain))
            }
        };

        if let Err(err) = ctx.run(pattern.clone(), chain) {
            self.respond_with_error(&mut ctx, &err);
        }
        if !ctx.writer().written() {
            if let Err(err) = ctx.writer_mut().write_header(StatusCode::OK) {
                warn!(error = %err, "failed to commit empty response");
            }
        }

        Served {
            status: ctx.status(),
            bytes: ctx.writer().size(),
            route: pattern,
            elapsed: started.elapsed(),
        }
    }

    /// Dispatch into memory and return the full response.
    #[must_use]
    pub fn dispatch(&self, request: Request) -> Response<Vec<u8>> {
        let buffer = BufferedResponse::new();
        self.serve(request, Box::new(buffer.clone()));
        buffer.take_response()
    }

    fn respond_with_error(&self, ctx: &mut Context, err: &anyhow::Error) {
        let http = if let Some(http) = err.downcast_ref::<HttpError>() {
            http.clone()
        } else if let Some(bind) = err.downcast_ref::<BindError>() {
            HttpError::new(bind.status(), bind.to_string())
        } else {
            HttpError::internal()
        };

        if http.status.is_server_error() {
            error!(
                method = %ctx.method(),
                path = %ctx.path(),
                route = ctx.route().unwrap_or(""),
                error = ?err,
                "handler failed"
            );
        } else {
            debug!(
                method = %ctx.method(),
                path = %ctx.path(),
                status = http.status.as_u16(),
                error = %err,
                "handler returned client error"
            );
        }

        if ctx.writer().written() {
            warn!(
                committed = ctx.status().as_u16(),
                error = %err,
                "handler failed after the response was written; keeping committed status"
            );
            return;
        }
        if let Err(write_err) = ctx.error(http.status, &http.message) {
            warn!(error = %write_err, "failed to write error response");
        }
    }
}

/// Strip one trailing slash, except from the root path.
fn normalize(path: &str) -> &str {
    if path.len() > 1 {
        path.strip_suffix('/').unwrap_or(path)
    } else {
        path
    }
}

impl Registrar for Router {
    fn handle(
        &mut self,
        method: Method,
        pattern: &str,
        handler: impl Handler,
        middleware: &[Middleware],
    ) -> Result<(), RouteError> {
        self.add_route(method, pattern, middleware, Arc::new(handler))
    }

    fn group(&mut self, prefix: &str, middleware: &[Middleware]) -> RouterGroup<'_> {
        RouterGroup::new(self, join_paths("", prefix), middleware.to_vec())
    }
}
