mod common;
mod tracing_util;

use common::requests::{get, json_body, send, with_body};
use http::{Request, StatusCode};
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use switchyard::{
    Cancellation, Context, HandlerResult, Registrar, RemoteAddr, Router, RouterConfig,
};
use tracing_util::TestTracing;

#[derive(Debug, Deserialize)]
struct Pet {
    name: String,
    age: u8,
}

fn pets_router() -> Router {
    let mut router = Router::new();
    router
        .post(
            "/pets",
            |ctx: &mut Context| -> HandlerResult {
                let pet: Pet = ctx.bind()?;
                ctx.string(StatusCode::CREATED, &format!("{} ({})", pet.name, pet.age))
            },
            &[],
        )
        .unwrap();
    router
}

const MULTIPART_CT: &str = "multipart/form-data; boundary=----fence";

fn multipart_body() -> Vec<u8> {
    concat!(
        "------fence\r\n",
        "Content-Disposition: form-data; name=\"name\"\r\n\r\n",
        "Rex\r\n",
        "------fence\r\n",
        "Content-Disposition: form-data; name=\"age\"\r\n\r\n",
        "4\r\n",
        "------fence\r\n",
        "Content-Disposition: form-data; name=\"photo\"; filename=\"rex.jpg\"\r\n",
        "Content-Type: image/jpeg\r\n\r\n",
        "JPEGBYTES\r\n",
        "------fence--\r\n"
    )
    .as_bytes()
    .to_vec()
}

#[test]
fn test_bind_json_form_and_multipart() {
    let router = pets_router();
    let cases = [
        with_body("POST", "/pets", "application/json", br#"{"name":"Rex","age":4}"#),
        with_body(
            "POST",
            "/pets",
            "application/x-www-form-urlencoded",
            b"name=Rex&age=4",
        ),
        with_body("POST", "/pets", MULTIPART_CT, &multipart_body()),
    ];
    for request in cases {
        assert_eq!(send(&router, request), (StatusCode::CREATED, "Rex (4)".to_string()));
    }
}

#[test]
fn test_bind_errors_map_to_client_statuses() {
    let router = pets_router();

    let response = router.dispatch(with_body("POST", "/pets", "application/json", b"{not json"));
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(&response)["error"]
        .as_str()
        .unwrap()
        .starts_with("invalid JSON body"));

    let response = router.dispatch(with_body("POST", "/pets", "text/csv", b"Rex,4"));
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let response = router.dispatch(with_body(
        "POST",
        "/pets",
        "application/x-www-form-urlencoded",
        b"name=Rex&age=old",
    ));
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[test]
fn test_multipart_over_limit_is_413() {
    let mut router = Router::with_config(RouterConfig {
        max_multipart_bytes: 16,
        ..Default::default()
    });
    router
        .post(
            "/upload",
            |ctx: &mut Context| -> HandlerResult {
                let size = ctx.form_file("photo")?.data.len();
                ctx.string(StatusCode::OK, &size.to_string())
            },
            &[],
        )
        .unwrap();
    let response = router.dispatch(with_body("POST", "/upload", MULTIPART_CT, &multipart_body()));
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[test]
fn test_form_file_and_form_value() {
    let mut router = Router::new();
    router
        .post(
            "/upload",
            |ctx: &mut Context| -> HandlerResult {
                let file = ctx.form_file("photo")?;
                let summary = format!(
                    "{}:{}:{}:{}",
                    file.filename,
                    file.content_type.as_deref().unwrap_or("-"),
                    String::from_utf8_lossy(&file.data),
                    ctx.form_value("name").unwrap_or("-"),
                );
                ctx.string(StatusCode::OK, &summary)
            },
            &[],
        )
        .unwrap();

    assert_eq!(
        send(&router, with_body("POST", "/upload", MULTIPART_CT, &multipart_body())).1,
        "rex.jpg:image/jpeg:JPEGBYTES:Rex"
    );

    // A form without the file is a 400 naming the field.
    let without_file = concat!(
        "------fence\r\n",
        "Content-Disposition: form-data; name=\"name\"\r\n\r\n",
        "Rex\r\n",
        "------fence--\r\n"
    );
    let response = router.dispatch(with_body(
        "POST",
        "/upload",
        MULTIPART_CT,
        without_file.as_bytes(),
    ));
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(&response)["error"],
        "no file uploaded in field 'photo'"
    );
}

#[test]
fn test_query_and_form_fallback() {
    let mut router = Router::new();
    router
        .post(
            "/search",
            |ctx: &mut Context| -> HandlerResult {
                let text = format!(
                    "{}|{}",
                    ctx.form_value("q").unwrap_or("-"),
                    ctx.form_value("page").unwrap_or("-")
                );
                ctx.string(StatusCode::OK, &text)
            },
            &[],
        )
        .unwrap();

    let request = with_body(
        "POST",
        "/search?page=9",
        "application/x-www-form-urlencoded",
        b"q=hello+world",
    );
    assert_eq!(send(&router, request).1, "hello world|9");
}

#[test]
fn test_client_ip_sources() {
    let mut router = Router::new();
    router
        .get(
            "/ip",
            |ctx: &mut Context| -> HandlerResult {
                let ip = ctx.client_ip().map(|ip| ip.to_string()).unwrap_or_default();
                ctx.string(StatusCode::OK, &ip)
            },
            &[],
        )
        .unwrap();

    let peer: SocketAddr = "192.0.2.10:5555".parse().unwrap();
    let mut request = get("/ip");
    request.extensions_mut().insert(RemoteAddr(peer));
    assert_eq!(send(&router, request).1, "192.0.2.10");

    let request = Request::get("/ip")
        .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
        .body(Vec::new())
        .unwrap();
    assert_eq!(send(&router, request).1, "203.0.113.7");

    let request = Request::get("/ip")
        .header("x-real-ip", "198.51.100.2")
        .body(Vec::new())
        .unwrap();
    assert_eq!(send(&router, request).1, "198.51.100.2");

    assert_eq!(send(&router, get("/ip")).1, "");
}

#[test]
fn test_cancellation_is_visible_to_handlers() {
    let mut router = Router::new();
    router
        .get(
            "/slow",
            |ctx: &mut Context| -> HandlerResult {
                if ctx.is_cancelled() {
                    return ctx.abort_with_error(StatusCode::SERVICE_UNAVAILABLE, "cancelled");
                }
                ctx.string(StatusCode::OK, "done")
            },
            &[],
        )
        .unwrap();

    let signal = Cancellation::new();
    let mut request = get("/slow");
    request.extensions_mut().insert(signal.clone());
    assert_eq!(send(&router, request).0, StatusCode::OK);

    signal.cancel();
    let mut request = get("/slow");
    request.extensions_mut().insert(signal.clone());
    assert_eq!(send(&router, request).0, StatusCode::SERVICE_UNAVAILABLE);

    let expired = Cancellation::with_deadline(Instant::now() - Duration::from_millis(1));
    let mut request = get("/slow");
    request.extensions_mut().insert(expired);
    assert_eq!(send(&router, request).0, StatusCode::SERVICE_UNAVAILABLE);
}

#[test]
fn test_store_does_not_leak_between_requests() {
    let mut router = Router::new();
    router.use_middleware(|ctx: &mut Context| -> HandlerResult {
        if ctx.query("tag").is_some() {
            let tag = ctx.query("tag").unwrap_or_default().to_string();
            ctx.set("tag", tag);
        }
        ctx.next()
    });
    router
        .get(
            "/tag",
            |ctx: &mut Context| -> HandlerResult {
                let tag = ctx.get::<String>("tag").cloned().unwrap_or_else(|| "none".into());
                ctx.string(StatusCode::OK, &tag)
            },
            &[],
        )
        .unwrap();

    assert_eq!(send(&router, get("/tag?tag=first")).1, "first");
    assert_eq!(send(&router, get("/tag")).1, "none");
    assert_eq!(router.pool().created(), 1);
}

#[test]
fn test_redirect_and_head() {
    let mut router = Router::new();
    router
        .get(
            "/old",
            |ctx: &mut Context| -> HandlerResult {
                ctx.redirect(StatusCode::MOVED_PERMANENTLY, "/new")
            },
            &[],
        )
        .unwrap();
    router
        .get(
            "/bad-redirect",
            |ctx: &mut Context| -> HandlerResult { ctx.redirect(StatusCode::OK, "/new") },
            &[],
        )
        .unwrap();
    router
        .head(
            "/doc",
            |ctx: &mut Context| -> HandlerResult { ctx.string(StatusCode::OK, "body text") },
            &[],
        )
        .unwrap();

    let response = router.dispatch(get("/old"));
    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(response.headers()["location"], "/new");

    assert_eq!(
        send(&router, get("/bad-redirect")).0,
        StatusCode::INTERNAL_SERVER_ERROR
    );

    let response = router.dispatch(Request::head("/doc").body(Vec::new()).unwrap());
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-length"], "9");
    assert!(response.body().is_empty());
}

#[test]
fn test_form_value_logs_unreadable_multipart_before_query_fallback() {
    let tracing = TestTracing::init();
    let mut router = Router::with_config(RouterConfig {
        max_multipart_bytes: 16,
        ..Default::default()
    });
    router
        .post(
            "/upload",
            |ctx: &mut Context| -> HandlerResult {
                let name = ctx.form_value("name").unwrap_or("-").to_string();
                ctx.string(StatusCode::OK, &name)
            },
            &[],
        )
        .unwrap();

    let request = with_body("POST", "/upload?name=query", MULTIPART_CT, &multipart_body());
    assert_eq!(send(&router, request).1, "query");

    let output = tracing.output();
    assert!(output.contains("multipart body unreadable"), "{output}");
    assert!(output.contains("16 byte limit"), "{output}");
}
