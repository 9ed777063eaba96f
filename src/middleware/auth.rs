use crate::context::Context;
use crate::handler::{Handler, HandlerResult};
use http::header::AUTHORIZATION;
use http::StatusCode;
use tracing::warn;

/// Context key set to `true` once a request passed authentication.
pub const AUTHENTICATED_KEY: &str = "authenticated";

/// Compares the `Authorization` header against a fixed value
/// (e.g. `Bearer s3cret`). Mismatches get a 401 and the chain stops.
pub struct AuthMiddleware {
    token: String,
}

impl AuthMiddleware {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// Accept `Authorization: Bearer {token}`.
    pub fn bearer(token: &str) -> Self {
        Self::new(format!("Bearer {token}"))
    }
}

impl Handler for AuthMiddleware {
    fn call(&self, ctx: &mut Context) -> HandlerResult {
        match ctx.header(AUTHORIZATION.as_str()) {
            Some(h) if h == self.token => {
                ctx.set(AUTHENTICATED_KEY, true);
                ctx.next()
            }
            presented => {
                warn!(
                    path = %ctx.path(),
                    credentials_present = presented.is_some(),
                    "rejected unauthenticated request"
                );
                ctx.abort_with_error(StatusCode::UNAUTHORIZED, "Unauthorized")
            }
        }
    }
}
