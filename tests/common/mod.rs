#![allow(dead_code)]

pub mod requests {
    use http::header::CONTENT_TYPE;
    use http::{Request, Response, StatusCode};
    use switchyard::Router;

    pub fn get(path: &str) -> Request<Vec<u8>> {
        Request::get(path).body(Vec::new()).unwrap()
    }

    pub fn with_body(method: &str, path: &str, content_type: &str, body: &[u8]) -> Request<Vec<u8>> {
        Request::builder()
            .method(method)
            .uri(path)
            .header(CONTENT_TYPE, content_type)
            .body(body.to_vec())
            .unwrap()
    }

    /// Dispatch and return status plus UTF-8 body.
    pub fn send(router: &Router, request: Request<Vec<u8>>) -> (StatusCode, String) {
        let response: Response<Vec<u8>> = router.dispatch(request);
        let status = response.status();
        (status, String::from_utf8(response.into_body()).unwrap())
    }

    pub fn json_body(response: &Response<Vec<u8>>) -> serde_json::Value {
        serde_json::from_slice(response.body()).unwrap()
    }
}

pub mod handlers {
    use http::StatusCode;
    use switchyard::{Context, HandlerResult};

    /// Responds with the matched route pattern.
    pub fn echo_route(ctx: &mut Context) -> HandlerResult {
        let route = ctx.route().unwrap_or("-").to_string();
        ctx.string(StatusCode::OK, &route)
    }

    /// Responds with `name=value` pairs of all path params, `&`-joined.
    pub fn echo_params(ctx: &mut Context) -> HandlerResult {
        let text = ctx
            .params()
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        ctx.string(StatusCode::OK, &text)
    }
}
