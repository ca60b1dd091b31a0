//! Forwarding to the NDC upstream.
//!
//! # Responsibilities
//! - Map `/api/{path}` onto the configured base URL
//! - Strip hop-by-hop headers, propagate the request ID
//! - Stream the upstream response back to the client
//!
//! # Design Decisions
//! - No deadline of its own; the request guard bounds the whole exchange
//! - Upstream I/O failures result in 502 Bad Gateway

use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, HeaderValue, Request, Uri},
    response::Response,
};
use http_body_util::LengthLimitError;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use url::Url;

use crate::config::UpstreamConfig;
use crate::error::ApiError;
use crate::http::request::X_REQUEST_ID;

const HOP_BY_HOP: [header::HeaderName; 8] = [
    header::CONNECTION,
    header::HOST,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Client bound to one upstream base URL.
#[derive(Clone)]
pub struct Upstream {
    base: Url,
    client: Client<HttpConnector, Body>,
}

impl std::fmt::Debug for Upstream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Upstream").field("base", &self.base.as_str()).finish()
    }
}

impl Upstream {
    /// Build the upstream client. Returns `None` when no base URL is set.
    ///
    /// The base URL is expected to have passed config validation.
    pub fn from_config(config: &UpstreamConfig) -> Option<Result<Self, url::ParseError>> {
        let base_url = config.base_url.as_deref()?;
        Some(Url::parse(base_url).map(|base| {
            let mut connector = HttpConnector::new();
            connector.set_connect_timeout(Some(Duration::from_millis(config.connect_timeout_ms)));
            let client = Client::builder(TokioExecutor::new()).build(connector);
            Self { base, client }
        }))
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Target URI for a path relative to the base URL (leading `/` optional).
    pub fn target_uri(&self, path: &str, query: Option<&str>) -> Result<Uri, ApiError> {
        let mut target = format!(
            "{}/{}",
            self.base.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        if let Some(query) = query {
            target.push('?');
            target.push_str(query);
        }

        target
            .parse::<Uri>()
            .map_err(|e| ApiError::Upstream(format!("invalid target uri: {e}")))
    }

    /// Forward a request, buffering at most `max_body` bytes of its body.
    pub async fn forward(
        &self,
        path: &str,
        request: Request<Body>,
        max_body: usize,
        request_id: &str,
    ) -> Result<Response, ApiError> {
        let (parts, body) = request.into_parts();
        let uri = self.target_uri(path, parts.uri.query())?;

        let bytes = read_body(body, max_body).await?;

        let mut outbound = Request::builder()
            .method(parts.method.clone())
            .uri(uri)
            .body(Body::from(bytes))
            .map_err(|e| ApiError::Internal(format!("failed to build upstream request: {e}")))?;

        copy_end_to_end(&parts.headers, outbound.headers_mut());
        if let Ok(value) = HeaderValue::from_str(request_id) {
            outbound.headers_mut().insert(X_REQUEST_ID.clone(), value);
        }

        let response = self.client.request(outbound).await.map_err(|e| {
            tracing::error!(request_id = %request_id, error = %e, "Upstream error");
            ApiError::Upstream(e.to_string())
        })?;

        let (mut parts, body) = response.into_parts();
        for name in HOP_BY_HOP.iter() {
            parts.headers.remove(name);
        }
        Ok(Response::from_parts(parts, Body::new(body)))
    }
}

/// Buffer a request body of at most `max_body` bytes.
async fn read_body(body: Body, max_body: usize) -> Result<Bytes, ApiError> {
    axum::body::to_bytes(body, max_body).await.map_err(|e| {
        if exceeded_limit(&e) {
            ApiError::PayloadTooLarge(max_body)
        } else {
            tracing::debug!(error = %e, "Failed to read request body");
            ApiError::BadRequest(e.to_string())
        }
    })
}

/// True when a length limit, ours or `RequestBodyLimitLayer`'s, is anywhere in
/// the error's source chain.
fn exceeded_limit(err: &axum::Error) -> bool {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = current {
        if e.is::<LengthLimitError>() {
            return true;
        }
        current = e.source();
    }
    false
}

fn copy_end_to_end(from: &HeaderMap, to: &mut HeaderMap) {
    for (name, value) in from.iter() {
        if !HOP_BY_HOP.contains(name) && *name != header::CONTENT_LENGTH {
            to.append(name.clone(), value.clone());
        }
    }
}
