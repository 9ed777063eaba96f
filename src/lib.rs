//! # Switchyard
//!
//! **Switchyard** is an embeddable HTTP routing and middleware-dispatch
//! engine. It maps `(method, path)` to a chain of handlers through a
//! per-method compressed trie, captures path parameters, and carries each
//! request through its chain in a pooled, reusable [`Context`].
//!
//! Switchyard does not own a socket. A transport parses requests into
//! `http::Request<Vec<u8>>` and hands them to [`Router::serve`] together
//! with a [`ResponseSink`]; [`Router::dispatch`] does the same into memory.
//!
//! ## Architecture
//!
//! - **[`router`]** - trie, route registration, groups and dispatch
//! - **[`context`]** - per-request state, binding and response helpers, pool
//! - **[`writer`]** - first-write-wins [`ResponseWriter`] and the sink trait
//! - **[`middleware`]** - recovery, tracing, metrics, auth, request ids, headers
//! - **[`static_files`]** - serving a directory from a catch-all route
//! - **[`config`]** - [`RouterConfig`] from environment or YAML
//! - **[`logging`]** - `tracing` subscriber setup
//!
//! ## Quick Start
//!
//! ```rust
//! use http::StatusCode;
//! use switchyard::middleware::{RecoveryMiddleware, TracingMiddleware};
//! use switchyard::{Context, HandlerResult, Registrar, Router};
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut router = Router::new();
//! router.use_middleware(RecoveryMiddleware);
//! router.use_middleware(TracingMiddleware);
//!
//! let mut api = router.group("/api/v1", &[]);
//! api.get("/users/:id", |ctx: &mut Context| -> HandlerResult {
//!     let id = ctx.param("id").unwrap_or_default().to_string();
//!     ctx.json(StatusCode::OK, &serde_json::json!({ "id": id }))
//! }, &[])?;
//!
//! let request = http::Request::get("/api/v1/users/7").body(Vec::new())?;
//! let response = router.dispatch(request);
//! assert_eq!(response.status(), StatusCode::OK);
//! # Ok(())
//! # }
//! ```
//!
//! ## Route Patterns
//!
//! | Pattern | Matches | Captures |
//! |---|---|---|
//! | `/users/all` | exactly that path | nothing |
//! | `/users/:id` | one segment after `/users/` | `id` |
//! | `/static/*filepath` | everything after `/static/` | `filepath` |
//!
//! Static routes win over a parameter at the same position. A catch-all
//! must be last and cannot share its position with other routes.

pub mod config;
pub mod context;
pub mod error;
pub mod handler;
pub mod ids;
pub mod logging;
pub mod middleware;
pub mod router;
pub mod static_files;
pub mod writer;

pub use config::{RouterConfig, TrailingSlash};
pub use context::{BindError, Cancellation, Context, RemoteAddr, Request};
pub use error::{HttpError, RouteError};
pub use handler::{Handler, HandlerChain, HandlerResult, Middleware};
pub use router::{Params, Registrar, RouteLookup, Router, RouterGroup, Served};
pub use writer::{BufferedResponse, ResponseSink, ResponseWriter};
