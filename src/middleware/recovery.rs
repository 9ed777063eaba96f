use crate::context::Context;
use crate::handler::{Handler, HandlerResult};
use http::StatusCode;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use tracing::error;

/// Catches panics from the rest of the chain and answers 500.
///
/// Without it a panicking handler unwinds into the transport. Register it
/// first so it covers every later element.
pub struct RecoveryMiddleware;

impl Handler for RecoveryMiddleware {
    fn call(&self, ctx: &mut Context) -> HandlerResult {
        match panic::catch_unwind(AssertUnwindSafe(|| ctx.next())) {
            Ok(result) => result,
            Err(payload) => {
                error!(
                    method = %ctx.method(),
                    path = %ctx.path(),
                    panic = %panic_message(payload.as_ref()),
                    "handler panicked"
                );
                ctx.abort();
                if ctx.writer().written() {
                    return Ok(());
                }
                ctx.error(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
