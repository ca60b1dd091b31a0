//! Gateway error types and their HTTP rendering.
//!
//! Variants map to HTTP status codes returned to callers:
//! - [`ApiError::Timeout`] → 504
//! - [`ApiError::Upstream`] → 502
//! - [`ApiError::UpstreamUnavailable`] → 503
//! - [`ApiError::RateLimited`] → 429
//! - [`ApiError::PayloadTooLarge`] → 413
//! - [`ApiError::Internal`] → 500

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// A guarded request ran past its deadline.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{operation} exceeded its {timeout_ms}ms deadline")]
pub struct TimeoutExceeded {
    /// Operation identity, e.g. `GET /api/AirShopping`.
    pub operation: String,
    /// Configured deadline in milliseconds.
    pub timeout_ms: u64,
}

impl TimeoutExceeded {
    pub fn new(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self {
            operation: operation.into(),
            timeout_ms,
        }
    }
}

/// Errors surfaced to HTTP clients.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Timeout(#[from] TimeoutExceeded),

    /// The upstream could not be reached or returned an unreadable response.
    #[error("upstream request failed: {0}")]
    Upstream(String),

    /// No upstream is configured for forwarding.
    #[error("upstream not configured")]
    UpstreamUnavailable,

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("request body exceeds {0} bytes")]
    PayloadTooLarge(usize),

    /// The client's request body could not be read.
    #[error("invalid request body: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status sent for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::UpstreamUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Timeout(_) => "request_timeout",
            ApiError::Upstream(_) => "upstream_error",
            ApiError::UpstreamUnavailable => "upstream_unavailable",
            ApiError::RateLimited => "rate_limited",
            ApiError::PayloadTooLarge(_) => "payload_too_large",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "error": self.code(),
            "message": self.to_string(),
        });
        if let ApiError::Timeout(timeout) = &self {
            body["operation"] = json!(timeout.operation);
            body["timeout_ms"] = json!(timeout.timeout_ms);
        }

        (self.status(), Json(body)).into_response()
    }
}
