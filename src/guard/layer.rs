//! Tower layer enforcing the per-request deadline.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::body::{Body, HttpBody};
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use tokio::sync::oneshot;
use tower::{Layer, Service};

use crate::error::{ApiError, TimeoutExceeded};
use crate::guard::body::GuardedBody;
use crate::guard::config::GuardConfig;
use crate::guard::deadline::Deadline;
use crate::guard::report::{LogReporter, TimeoutRecord, TimeoutReporter};
use crate::http::request::correlation_id;

/// Layer that wraps services in a [`RequestGuard`].
#[derive(Debug, Clone)]
pub struct RequestGuardLayer {
    config: Arc<GuardConfig>,
    reporter: Arc<dyn TimeoutReporter>,
}

impl RequestGuardLayer {
    /// Create a layer reporting timeouts through [`LogReporter`].
    pub fn new(config: GuardConfig) -> Self {
        Self {
            config: Arc::new(config),
            reporter: Arc::new(LogReporter),
        }
    }

    /// Replace the timeout reporter.
    pub fn with_reporter(mut self, reporter: Arc<dyn TimeoutReporter>) -> Self {
        self.reporter = reporter;
        self
    }
}

impl<S> Layer<S> for RequestGuardLayer {
    type Service = RequestGuard<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestGuard {
            inner,
            config: Arc::clone(&self.config),
            reporter: Arc::clone(&self.reporter),
        }
    }
}

/// Service racing each non-exempt request against its deadline.
///
/// The inner future runs on its own task. When the deadline wins before the
/// headers, the caller gets a 504 immediately and the handler keeps running;
/// its response is discarded when it arrives. When the headers win but the body
/// is still streaming, the deadline moves into a [`GuardedBody`] and cuts the
/// stream if it fires.
#[derive(Debug, Clone)]
pub struct RequestGuard<S> {
    inner: S,
    config: Arc<GuardConfig>,
    reporter: Arc<dyn TimeoutReporter>,
}

impl<S, B> Service<Request<B>> for RequestGuard<S>
where
    S: Service<Request<B>, Response = Response, Error = Infallible> + Clone + Send + 'static,
    S::Future: Send + 'static,
    B: Send + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<B>) -> Self::Future {
        // The ready service goes to this request; keep a fresh clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        if self.config.is_exempt(request.uri().path()) {
            tracing::trace!(path = %request.uri().path(), "Exempt from request guard");
            return Box::pin(inner.call(request));
        }

        let timeout = self.config.timeout();
        let record = TimeoutRecord::new(
            request.method().as_str(),
            request.uri().path(),
            duration_ms(timeout),
            correlation_id(&request),
        );
        let reporter = Arc::clone(&self.reporter);
        let handler = inner.call(request);

        Box::pin(race(handler, timeout, record, reporter))
    }
}

async fn race<F>(
    handler: F,
    timeout: Duration,
    record: TimeoutRecord,
    reporter: Arc<dyn TimeoutReporter>,
) -> Result<Response, Infallible>
where
    F: Future<Output = Result<Response, Infallible>> + Send + 'static,
{
    let (fired_tx, mut fired_rx) = oneshot::channel::<()>();
    let fired_record = record.clone();
    let deadline = Deadline::arm(timeout, move || {
        reporter.report(&fired_record);
        let _ = fired_tx.send(());
    });

    let mut work = tokio::spawn(handler);

    let outcome = tokio::select! {
        biased;
        outcome = &mut work => Some(outcome),
        Ok(()) = &mut fired_rx => None,
    };

    let failure = TimeoutExceeded::new(record.operation(), record.timeout_ms);
    match outcome {
        Some(Ok(Ok(response))) => {
            if response.body().is_end_stream() {
                if deadline.complete() {
                    return Ok(response);
                }
            } else if !deadline.has_fired() {
                // Headers are ready but the body may still stall; the deadline
                // rides along until the last frame.
                return Ok(response.map(|body| {
                    Body::new(GuardedBody::new(body, deadline, fired_rx, failure))
                }));
            }
        }
        Some(Ok(Err(never))) => match never {},
        Some(Err(e)) if deadline.complete() => {
            tracing::error!(
                correlation_id = %record.correlation_id,
                error = %e,
                "Guarded handler task failed"
            );
            return Ok(ApiError::Internal("handler failed".to_string()).into_response());
        }
        // Deadline fired first; `work` is detached and its response dropped.
        Some(Err(_)) | None => {}
    }

    Ok(ApiError::from(failure).into_response())
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
