//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with probe, metrics and forwarding routes
//! - Wire up middleware (request ID, tracing, security, body limit, guard)
//! - Bind server to listener and drain on shutdown
//!
//! # Layer order (outermost first)
//! ```text
//! SetRequestId → Trace → PropagateRequestId → CORS → compression
//!     → security headers → body limit → RequestGuard → routes
//!     (rate limit on /api only)
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    http::Request,
    middleware,
    routing::{any, get},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tower_http::{
    compression::CompressionLayer,
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::{validate_config, ConfigError, GatewayConfig, ValidationError};
use crate::guard::{GuardConfig, RequestGuardLayer};
use crate::http::handlers;
use crate::http::request::{correlation_id, MakeCorrelationId, X_REQUEST_ID};
use crate::http::upstream::Upstream;
use crate::lifecycle::ShutdownListener;
use crate::security::{apply_security_headers, cors_layer, rate_limit_middleware, RateLimiter};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub upstream: Option<Upstream>,
    pub metrics: Option<PrometheusHandle>,
    pub max_body_size: usize,
}

/// HTTP server for the gateway.
#[derive(Debug)]
pub struct GatewayServer {
    router: Router,
    config: GatewayConfig,
}

impl GatewayServer {
    /// Create a server that reports timeouts through the default reporter.
    pub fn new(config: GatewayConfig) -> Result<Self, ConfigError> {
        Self::builder(config).build()
    }

    pub fn builder(config: GatewayConfig) -> GatewayServerBuilder {
        GatewayServerBuilder {
            config,
            metrics: None,
            guard: None,
        }
    }

    /// The fully layered router (useful for in-process testing).
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: ShutdownListener,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            guard_timeout_ms = self.config.guard.timeout_ms,
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.recv())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Builder allowing the metrics handle and guard layer to be injected.
pub struct GatewayServerBuilder {
    config: GatewayConfig,
    metrics: Option<PrometheusHandle>,
    guard: Option<RequestGuardLayer>,
}

impl GatewayServerBuilder {
    pub fn metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Use a prebuilt guard layer instead of one derived from `[guard]`.
    pub fn guard_layer(mut self, layer: RequestGuardLayer) -> Self {
        self.guard = Some(layer);
        self
    }

    pub fn build(self) -> Result<GatewayServer, ConfigError> {
        let config = self.config;
        validate_config(&config).map_err(ConfigError::Validation)?;

        let guard = match self.guard {
            Some(layer) => layer,
            None => RequestGuardLayer::new(GuardConfig::try_from(&config.guard)?),
        };

        let upstream = Upstream::from_config(&config.upstream)
            .transpose()
            .map_err(|_| {
                ConfigError::Validation(vec![ValidationError::UpstreamUrl(
                    config.upstream.base_url.clone().unwrap_or_default(),
                )])
            })?;

        let state = AppState {
            upstream,
            metrics: self.metrics,
            max_body_size: config.security.max_body_size,
        };

        let router = build_router(&config, state, guard);
        Ok(GatewayServer { router, config })
    }
}

/// Build the Axum router with all middleware layers.
pub fn build_router(config: &GatewayConfig, state: AppState, guard: RequestGuardLayer) -> Router {
    let mut api = Router::new().route("/api/{*path}", any(handlers::proxy));
    if config.rate_limit.enabled {
        let limiter = Arc::new(RateLimiter::new(&config.rate_limit));
        api = api.route_layer(middleware::from_fn_with_state(limiter, rate_limit_middleware));
    }

    let mut router = Router::new()
        .route("/health", get(handlers::health))
        .route("/ready", get(handlers::ready))
        .route("/metrics", get(handlers::metrics_endpoint))
        .merge(api)
        .fallback(handlers::not_found)
        .with_state(state)
        .layer(guard)
        .layer(RequestBodyLimitLayer::new(config.security.max_body_size));

    if config.security.enable_headers {
        router = apply_security_headers(router);
    }
    if config.listener.compression {
        router = router.layer(CompressionLayer::new());
    }
    if let Some(cors) = cors_layer(&config.security.cors_allowed_origins) {
        router = router.layer(cors);
    }

    router
        .layer(PropagateRequestIdLayer::new(X_REQUEST_ID.clone()))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
            tracing::info_span!(
                "request",
                method = %request.method(),
                path = %request.uri().path(),
                request_id = %correlation_id(request),
            )
        }))
        .layer(SetRequestIdLayer::new(X_REQUEST_ID.clone(), MakeCorrelationId))
}
