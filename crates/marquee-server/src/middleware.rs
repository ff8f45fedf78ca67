use std::time::Instant;

use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::metrics;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Propagate `X-Request-Id`, generating one when the client sent none.
pub async fn request_id(mut req: Request<Body>, next: Next) -> Response {
    let header_name = HeaderName::from_static(REQUEST_ID_HEADER);

    let req_id_value = match req.headers().get(&header_name) {
        Some(value) => value.clone(),
        None => match HeaderValue::from_str(&Uuid::new_v4().to_string()) {
            Ok(value) => value,
            Err(_) => return next.run(req).await,
        },
    };

    // Available to the trace span via extensions
    req.extensions_mut().insert(req_id_value.clone());

    let mut res = next.run(req).await;
    res.headers_mut().insert(header_name, req_id_value);
    res
}

/// Count requests and record latency per matched route.
pub async fn track_http(req: Request<Body>, next: Next) -> Response {
    let started = Instant::now();
    let method = req.method().clone();
    // Route template keeps label cardinality bounded
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let res = next.run(req).await;
    metrics::record_http_request(
        method.as_str(),
        &path,
        res.status().as_u16(),
        started.elapsed(),
    );
    res
}
