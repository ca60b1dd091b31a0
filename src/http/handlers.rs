//! Route handlers.

use std::time::Instant;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::http::request::correlation_id;
use crate::http::server::AppState;
use crate::observability::metrics;

/// Liveness probe.
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Readiness probe. Reports the upstream the gateway forwards to, if any.
pub async fn ready(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ready",
        "upstream": state.upstream.as_ref().map(|u| u.base().as_str()),
    }))
}

/// Prometheus scrape endpoint.
pub async fn metrics_endpoint(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::NOT_FOUND, "metrics disabled").into_response(),
    }
}

/// Forward `/api/{*path}` to the upstream.
pub async fn proxy(
    State(state): State<AppState>,
    Path(path): Path<String>,
    request: Request<Body>,
) -> Result<Response, ApiError> {
    let start = Instant::now();
    let method = request.method().to_string();
    let request_id = correlation_id(&request);

    let upstream = state.upstream.as_ref().ok_or(ApiError::UpstreamUnavailable)?;

    tracing::debug!(request_id = %request_id, method = %method, path = %path, "Forwarding request");

    let result = upstream
        .forward(&path, request, state.max_body_size, &request_id)
        .await;

    let status = match &result {
        Ok(response) => response.status(),
        Err(e) => e.status(),
    };
    metrics::record_request(&method, status.as_u16(), start);

    result
}

pub async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "not_found", "message": "No matching route" })),
    )
        .into_response()
}
