use axum::{
    Json,
    extract::State,
    http::{HeaderName, HeaderValue, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::metrics;
use crate::server::AppState;

pub const EXECUTION_TIME_HEADER: &str = "x-execution-time";
pub const CACHE_SOURCE_HEADER: &str = "x-cache-source";

#[derive(Serialize)]
pub struct HealthResponse<'a> {
    status: &'a str,
}

#[derive(Serialize)]
pub struct ReadinessResponse<'a> {
    status: &'a str,
    degraded: bool,
    warm_tier: &'a str,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    error: &'static str,
    message: String,
}

/// `GET /movie`: the listing, from whichever tier has it.
pub async fn get_movies(State(state): State<AppState>) -> Response {
    match state.retriever.fetch().await {
        Ok(result) => {
            let mut response = Json(&*result.collection).into_response();
            let headers = response.headers_mut();
            let elapsed_ms = result.elapsed.as_secs_f64() * 1000.0;
            if let Ok(value) = HeaderValue::from_str(&format!("{elapsed_ms:.2}ms")) {
                headers.insert(HeaderName::from_static(EXECUTION_TIME_HEADER), value);
            }
            headers.insert(
                HeaderName::from_static(CACHE_SOURCE_HEADER),
                HeaderValue::from_static(result.source.as_str()),
            );
            response
        }
        Err(e) => {
            let body = ErrorResponse {
                error: e.kind(),
                message: format!("Internal server error: {e}"),
            };
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        }
    }
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

/// Readiness never fails on Redis; a missing warm tier only degrades latency.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let warm_tier = match &state.warm {
        Some(warm) => {
            if warm.is_available().await {
                "up"
            } else {
                "down"
            }
        }
        None => "disabled",
    };
    let degraded = warm_tier == "down";
    let body = ReadinessResponse {
        status: if degraded { "degraded" } else { "ready" },
        degraded,
        warm_tier,
    };
    (StatusCode::OK, Json(body))
}

pub async fn prometheus_metrics() -> Response {
    match metrics::render_metrics() {
        Some(body) => (
            StatusCode::OK,
            [(CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics not initialized").into_response(),
    }
}
