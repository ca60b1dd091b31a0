//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, limits > 0)
//! - Check addresses and URLs parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::HeaderValue;
use thiserror::Error;
use url::Url;

use crate::config::schema::GatewayConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("listener.bind_address `{0}` is not a socket address")]
    BindAddress(String),

    #[error("guard.timeout_ms must be greater than zero")]
    ZeroGuardTimeout,

    #[error("guard.exempt_paths entry `{0}` must start with '/'")]
    ExemptPath(String),

    #[error("upstream.base_url `{0}` is not a valid URL")]
    UpstreamUrl(String),

    #[error("upstream.base_url scheme `{0}` is not supported (expected http)")]
    UpstreamScheme(String),

    #[error("rate_limit.{0} must be greater than zero")]
    RateLimit(&'static str),

    #[error("security.max_body_size must be greater than zero")]
    ZeroBodyLimit,

    #[error("security.cors_allowed_origins entry `{0}` is not `*` or an http(s) origin")]
    CorsOrigin(String),

    #[error("observability.log_level `{0}` is not one of trace, debug, info, warn, error")]
    LogLevel(String),
}

/// Validate a parsed configuration, collecting every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    if config.guard.timeout_ms == 0 {
        errors.push(ValidationError::ZeroGuardTimeout);
    }
    for path in &config.guard.exempt_paths {
        if !path.starts_with('/') {
            errors.push(ValidationError::ExemptPath(path.clone()));
        }
    }

    if let Some(base_url) = &config.upstream.base_url {
        match Url::parse(base_url) {
            Ok(url) if url.scheme() != "http" => {
                errors.push(ValidationError::UpstreamScheme(url.scheme().to_string()));
            }
            Ok(_) => {}
            Err(_) => errors.push(ValidationError::UpstreamUrl(base_url.clone())),
        }
    }

    if config.rate_limit.enabled {
        if config.rate_limit.requests_per_second == 0 {
            errors.push(ValidationError::RateLimit("requests_per_second"));
        }
        if config.rate_limit.burst_size == 0 {
            errors.push(ValidationError::RateLimit("burst_size"));
        }
    }

    if config.security.max_body_size == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }

    let origins = &config.security.cors_allowed_origins;
    for origin in origins {
        if !is_valid_origin(origin, origins.len()) {
            errors.push(ValidationError::CorsOrigin(origin.clone()));
        }
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::LogLevel(config.observability.log_level.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// `*` on its own, or a bare `scheme://host[:port]` origin.
fn is_valid_origin(origin: &str, total: usize) -> bool {
    if origin == "*" {
        return total == 1;
    }
    match Url::parse(origin) {
        Ok(url) => {
            matches!(url.scheme(), "http" | "https")
                && url.has_host()
                && url.path() == "/"
                && !origin.ends_with('/')
                && url.query().is_none()
                && HeaderValue::from_str(origin).is_ok()
        }
        Err(_) => false,
    }
}
