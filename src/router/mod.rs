//! # Router Module
//!
//! Maps `(method, path)` to a composed handler chain.
//!
//! ## Architecture
//!
//! - **[`Tree`]**: one compressed trie per HTTP method. Static edges share
//!   prefixes; `:name` captures one segment and `*name` captures the rest.
//!   Static children are tried before the wildcard child, with backtracking.
//! - **`core`**: the [`Router`]. Registration composes global, group and
//!   route middleware with the endpoint into one immutable chain per route;
//!   dispatch checks out a pooled [`Context`](crate::Context), resolves the
//!   route and runs the chain.
//! - **`group`**: the [`Registrar`] trait shared by [`Router`] and
//!   [`RouterGroup`], which prefixes patterns and prepends middleware.
//!
//! ## Example
//!
//! ```rust
//! use http::StatusCode;
//! use switchyard::{Context, HandlerResult, Registrar, Router};
//!
//! fn show_user(ctx: &mut Context) -> HandlerResult {
//!     let id = ctx.param("id").unwrap_or_default().to_string();
//!     ctx.string(StatusCode::OK, &id)
//! }
//!
//! let mut router = Router::new();
//! router.get("/users/:id", show_user, &[]).unwrap();
//!
//! let request = http::Request::get("/users/42").body(Vec::new()).unwrap();
//! let response = router.dispatch(request);
//! assert_eq!(response.body(), b"42");
//! ```

mod core;
mod group;
mod node;
mod params;
mod tree;

pub use self::core::{RouteLookup, Router, Served};
pub use group::{Registrar, RouterGroup};
pub use params::{ParamVec, Params, MAX_INLINE_PARAMS};
pub use tree::{Lookup, Tree};
