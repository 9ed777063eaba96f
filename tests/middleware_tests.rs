mod common;
mod tracing_util;

use common::handlers::echo_route;
use common::requests::{get, json_body, send};
use http::{HeaderName, HeaderValue, Request, StatusCode};
use parking_lot::Mutex;
use std::sync::Arc;
use switchyard::ids::RequestId;
use switchyard::middleware::{
    from_fn, AuthMiddleware, HeadersMiddleware, MetricsMiddleware, RecoveryMiddleware,
    RequestIdMiddleware, TracingMiddleware, AUTHENTICATED_KEY, REQUEST_ID_HEADER, REQUEST_ID_KEY,
};
use switchyard::{Context, HandlerResult, Registrar, Router};
use tracing_util::TestTracing;

fn logger(
    log: &Arc<Mutex<Vec<&'static str>>>,
    enter: &'static str,
    exit: &'static str,
) -> impl Fn(&mut Context) -> HandlerResult + Send + Sync + 'static {
    let log = Arc::clone(log);
    move |ctx: &mut Context| -> HandlerResult {
        log.lock().push(enter);
        let result = ctx.next();
        log.lock().push(exit);
        result
    }
}

#[test]
fn test_entry_and_exit_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut router = Router::new();
    router.use_middleware(logger(&log, "A>", "<A"));
    router.use_middleware(logger(&log, "B>", "<B"));
    let handler_log = Arc::clone(&log);
    router
        .get(
            "/order",
            move |ctx: &mut Context| -> HandlerResult {
                handler_log.lock().push("H");
                ctx.no_content()
            },
            &[from_fn(logger(&log, "C>", "<C")), from_fn(logger(&log, "D>", "<D"))],
        )
        .unwrap();

    router.dispatch(get("/order"));
    assert_eq!(
        *log.lock(),
        vec!["A>", "B>", "C>", "D>", "H", "<D", "<C", "<B", "<A"]
    );
}

#[test]
fn test_abort_in_b_skips_c_d_h() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut router = Router::new();
    router.use_middleware(logger(&log, "A>", "<A"));
    let b_log = Arc::clone(&log);
    router.use_middleware(move |ctx: &mut Context| -> HandlerResult {
        b_log.lock().push("B>");
        ctx.string(StatusCode::TOO_MANY_REQUESTS, "slow down")?;
        ctx.abort();
        // Calling next after abort is a no-op.
        ctx.next()
    });
    let handler_log = Arc::clone(&log);
    router
        .get(
            "/limited",
            move |ctx: &mut Context| -> HandlerResult {
                handler_log.lock().push("H");
                ctx.no_content()
            },
            &[from_fn(logger(&log, "C>", "<C")), from_fn(logger(&log, "D>", "<D"))],
        )
        .unwrap();

    assert_eq!(
        send(&router, get("/limited")),
        (StatusCode::TOO_MANY_REQUESTS, "slow down".to_string())
    );
    assert_eq!(*log.lock(), vec!["A>", "B>", "<A"]);
}

#[test]
fn test_is_aborted_visible_to_outer_middleware() {
    let seen = Arc::new(Mutex::new(None));
    let seen_outer = Arc::clone(&seen);
    let mut router = Router::new();
    router.use_middleware(move |ctx: &mut Context| -> HandlerResult {
        let result = ctx.next();
        *seen_outer.lock() = Some(ctx.is_aborted());
        result
    });
    router.use_middleware(AuthMiddleware::bearer("letmein"));
    router.get("/private", echo_route, &[]).unwrap();

    assert_eq!(send(&router, get("/private")).0, StatusCode::UNAUTHORIZED);
    assert_eq!(*seen.lock(), Some(true));

    let request = Request::get("/private")
        .header("authorization", "Bearer letmein")
        .body(Vec::new())
        .unwrap();
    assert_eq!(send(&router, request).0, StatusCode::OK);
    assert_eq!(*seen.lock(), Some(false));
}

#[test]
fn test_auth_marks_context() {
    let mut router = Router::new();
    router.use_middleware(AuthMiddleware::new("Token abc"));
    router
        .get(
            "/me",
            |ctx: &mut Context| -> HandlerResult {
                let authenticated = *ctx.must_get::<bool>(AUTHENTICATED_KEY);
                ctx.string(StatusCode::OK, &authenticated.to_string())
            },
            &[],
        )
        .unwrap();

    let request = Request::get("/me")
        .header("authorization", "Token abc")
        .body(Vec::new())
        .unwrap();
    assert_eq!(send(&router, request).1, "true");

    let response = router.dispatch(get("/me"));
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(&response)["error"], "Unauthorized");
}

#[test]
fn test_recovery_turns_panic_into_500() {
    let mut router = Router::new();
    router.use_middleware(RecoveryMiddleware);
    router
        .get(
            "/panic",
            |_ctx: &mut Context| -> HandlerResult { panic!("handler exploded") },
            &[],
        )
        .unwrap();
    router.get("/fine", echo_route, &[]).unwrap();

    let response = router.dispatch(get("/panic"));
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(&response)["error"], "Internal Server Error");

    // The router keeps serving, and the context went back to the pool.
    assert_eq!(send(&router, get("/fine")).0, StatusCode::OK);
    assert_eq!(router.pool().created(), 1);
}

#[test]
fn test_recovery_keeps_status_written_before_panic() {
    let mut router = Router::new();
    router.use_middleware(RecoveryMiddleware);
    router
        .get(
            "/half",
            |ctx: &mut Context| -> HandlerResult {
                ctx.string(StatusCode::ACCEPTED, "partial")?;
                panic!("after write");
            },
            &[],
        )
        .unwrap();
    assert_eq!(
        send(&router, get("/half")),
        (StatusCode::ACCEPTED, "partial".to_string())
    );
}

#[test]
fn test_metrics_counts_requests_errors_and_misses() {
    let metrics = MetricsMiddleware::new();
    let mut router = Router::new();
    router.use_middleware(metrics.clone());
    router.get("/ok", echo_route, &[]).unwrap();
    router
        .get(
            "/fail",
            |_ctx: &mut Context| -> HandlerResult { Err(anyhow::anyhow!("nope")) },
            &[],
        )
        .unwrap();

    router.dispatch(get("/ok"));
    router.dispatch(get("/ok"));
    router.dispatch(get("/fail"));
    router.dispatch(get("/missing"));

    assert_eq!(metrics.request_count(), 4);
    assert_eq!(metrics.error_count(), 1);
    assert_eq!(metrics.not_found_count(), 1);
}

#[test]
fn test_request_id_is_generated_and_echoed() {
    let mut router = Router::new();
    router.use_middleware(RequestIdMiddleware);
    router
        .get(
            "/id",
            |ctx: &mut Context| -> HandlerResult {
                let id = ctx.must_get::<RequestId>(REQUEST_ID_KEY).to_string();
                ctx.string(StatusCode::OK, &id)
            },
            &[],
        )
        .unwrap();

    let response = router.dispatch(get("/id"));
    let header = response.headers()[REQUEST_ID_HEADER].to_str().unwrap().to_string();
    assert_eq!(header.len(), 26);
    assert_eq!(response.body(), header.as_bytes());

    let incoming = RequestId::new().to_string();
    let request = Request::get("/id")
        .header(REQUEST_ID_HEADER, incoming.as_str())
        .body(Vec::new())
        .unwrap();
    assert_eq!(send(&router, request).1, incoming);
}

#[test]
fn test_headers_apply_to_hits_and_misses() {
    let mut router = Router::new();
    router.use_middleware(
        HeadersMiddleware::secure_defaults().with(
            HeaderName::from_static("x-powered-by"),
            HeaderValue::from_static("switchyard"),
        ),
    );
    router.get("/page", echo_route, &[]).unwrap();

    for path in ["/page", "/missing"] {
        let response = router.dispatch(get(path));
        assert_eq!(response.headers()["x-content-type-options"], "nosniff");
        assert_eq!(response.headers()["x-frame-options"], "DENY");
        assert_eq!(response.headers()["x-powered-by"], "switchyard");
    }
}

#[test]
fn test_tracing_middleware_logs_completion() {
    let tracing = TestTracing::init();
    let mut router = Router::new();
    router.use_middleware(TracingMiddleware);
    router.get("/traced/:id", echo_route, &[]).unwrap();

    router.dispatch(get("/traced/5"));

    let output = tracing.output();
    assert!(output.contains("request completed"), "{output}");
    assert!(output.contains("/traced/5"), "{output}");
}
