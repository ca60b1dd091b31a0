//! Request identity.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) when the client sent none
//! - Resolve the correlation ID used by logs and timeout records
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - A client-supplied `x-request-id` is kept as-is

use axum::http::{HeaderName, HeaderValue, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

/// Header carrying the correlation ID.
pub static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Placeholder used when a request carries no ID at all.
pub const UNKNOWN_REQUEST_ID: &str = "unknown";

/// Generates UUID v4 request IDs for `SetRequestIdLayer`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeCorrelationId;

impl MakeRequestId for MakeCorrelationId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().simple().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// Correlation ID of a request: the `RequestId` extension if set, else the
/// raw header, else [`UNKNOWN_REQUEST_ID`].
pub fn correlation_id<B>(request: &Request<B>) -> String {
    request
        .extensions()
        .get::<RequestId>()
        .map(RequestId::header_value)
        .or_else(|| request.headers().get(&X_REQUEST_ID))
        .and_then(|v| v.to_str().ok())
        .unwrap_or(UNKNOWN_REQUEST_ID)
        .to_string()
}
