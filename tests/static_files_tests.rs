mod common;

use common::requests::{get, json_body, send};
use http::{Request, StatusCode};
use std::fs;
use std::sync::Arc;
use switchyard::middleware::HeadersMiddleware;
use switchyard::{Middleware, Registrar, Router};
use tempfile::TempDir;

fn site() -> (TempDir, Router) {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("index.html"), "<h1>home</h1>").unwrap();
    fs::create_dir_all(dir.path().join("css")).unwrap();
    fs::write(dir.path().join("css/site.css"), "body{}").unwrap();
    fs::write(dir.path().join("my file.txt"), "spaced").unwrap();

    let mut router = Router::new();
    router.static_files("/assets", dir.path()).unwrap();
    (dir, router)
}

#[test]
fn test_serves_files_with_content_type() {
    let (_dir, router) = site();
    let response = router.dispatch(get("/assets/css/site.css"));
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "text/css; charset=utf-8");
    assert_eq!(response.headers()["content-length"], "6");
    assert_eq!(response.body(), b"body{}");

    let response = router.dispatch(get("/assets/index.html"));
    assert_eq!(response.headers()["content-type"], "text/html; charset=utf-8");
}

#[test]
fn test_percent_encoded_names() {
    let (_dir, router) = site();
    assert_eq!(
        send(&router, get("/assets/my%20file.txt")),
        (StatusCode::OK, "spaced".to_string())
    );
}

#[test]
fn test_missing_and_traversal_are_404() {
    let (_dir, router) = site();
    for path in [
        "/assets/nope.txt",
        "/assets/../Cargo.toml",
        "/assets/%2e%2e/Cargo.toml",
        "/assets/css/../../secret",
    ] {
        let response = router.dispatch(get(path));
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{path}");
        assert_eq!(json_body(&response)["error"], "file not found");
    }
}

#[test]
fn test_head_sends_headers_only() {
    let (_dir, router) = site();
    let response = router.dispatch(Request::head("/assets/css/site.css").body(Vec::new()).unwrap());
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-length"], "6");
    assert!(response.body().is_empty());
}

#[test]
fn test_static_files_inside_group_with_middleware() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("logo.svg"), "<svg/>").unwrap();

    let mut router = Router::new();
    let cache: Middleware = Arc::new(HeadersMiddleware::new().with(
        http::header::CACHE_CONTROL,
        http::HeaderValue::from_static("max-age=3600"),
    ));
    let mut public = router.group("/public", &[cache]);
    public.static_files("/img", dir.path()).unwrap();

    let response = router.dispatch(get("/public/img/logo.svg"));
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "image/svg+xml");
    assert_eq!(response.headers()["cache-control"], "max-age=3600");
}
