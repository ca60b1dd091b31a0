//! Deadline behaviour of the request guard, driven on a paused clock.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    http::{Request, StatusCode},
    response::Response,
    routing::get,
    Router,
};
use ndc_gateway::guard::{GuardConfig, RequestGuardLayer, TimeoutRecord};
use tokio::time::{sleep, Instant};
use tower::ServiceExt;

mod common;
use common::RecordingReporter;

const TIMEOUT: Duration = Duration::from_millis(100);

/// Headers go out at once; the single chunk follows after `delay`.
fn delayed_chunk(delay: Duration, chunk: &'static str) -> Body {
    Body::from_stream(futures_util::stream::once(async move {
        sleep(delay).await;
        Ok::<_, std::io::Error>(Bytes::from_static(chunk.as_bytes()))
    }))
}

struct Harness {
    app: Router,
    reporter: Arc<RecordingReporter>,
    slow_finished: Arc<AtomicUsize>,
}

fn harness() -> Harness {
    let reporter = RecordingReporter::new();
    let slow_finished = Arc::new(AtomicUsize::new(0));
    let finished = Arc::clone(&slow_finished);

    let guard = RequestGuardLayer::new(GuardConfig::new(TIMEOUT, ["/health", "/metrics"]).unwrap())
        .with_reporter(reporter.clone());

    let app = Router::new()
        .route(
            "/fast",
            get(|| async {
                sleep(Duration::from_millis(10)).await;
                "fast"
            }),
        )
        .route(
            "/slow-op",
            get(move || {
                let finished = Arc::clone(&finished);
                async move {
                    sleep(Duration::from_millis(200)).await;
                    finished.fetch_add(1, Ordering::SeqCst);
                    "slow"
                }
            }),
        )
        .route(
            "/edge",
            get(|| async {
                sleep(Duration::from_millis(99)).await;
                "edge"
            }),
        )
        .route(
            "/health",
            get(|| async {
                sleep(Duration::from_millis(500)).await;
                "healthy"
            }),
        )
        .route("/never", get(|| std::future::pending::<&'static str>()))
        .route(
            "/stream-stall",
            get(|| async { delayed_chunk(Duration::from_millis(1_000), "late") }),
        )
        .route(
            "/stream-quick",
            get(|| async { delayed_chunk(Duration::from_millis(50), "early") }),
        )
        .layer(guard);

    Harness {
        app,
        reporter,
        slow_finished,
    }
}

fn get_request(path: &str) -> Request<Body> {
    Request::builder().uri(path).body(Body::empty()).unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

#[tokio::test(start_paused = true)]
async fn fast_handler_never_times_out() {
    let h = harness();

    let response = h.app.oneshot(get_request("/fast")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "fast");

    sleep(Duration::from_millis(500)).await;
    assert_eq!(h.reporter.count(), 0);
}

#[tokio::test(start_paused = true)]
async fn slow_handler_times_out_once_within_window() {
    let h = harness();

    let start = Instant::now();
    let response = h.app.oneshot(get_request("/slow-op")).await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    assert!(elapsed >= TIMEOUT, "fired early after {elapsed:?}");
    assert!(elapsed <= Duration::from_millis(150), "fired late after {elapsed:?}");

    let body = body_json(response).await;
    assert_eq!(body["error"], "request_timeout");
    assert_eq!(body["operation"], "GET /slow-op");
    assert_eq!(body["timeout_ms"], 100);

    assert_eq!(
        h.reporter.records(),
        vec![TimeoutRecord::new("GET", "/slow-op", 100, "unknown")]
    );

    // The handler is not preempted; its late response changes nothing.
    sleep(Duration::from_millis(300)).await;
    assert_eq!(h.slow_finished.load(Ordering::SeqCst), 1);
    assert_eq!(h.reporter.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn handler_that_never_completes_times_out() {
    let h = harness();

    let response = h.app.oneshot(get_request("/never")).await.unwrap();
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);

    sleep(Duration::from_secs(5)).await;
    assert_eq!(h.reporter.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn exempt_path_runs_to_completion() {
    let h = harness();

    let start = Instant::now();
    let response = h.app.oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(start.elapsed() >= Duration::from_millis(500));
    assert_eq!(body_text(response).await, "healthy");
    assert_eq!(h.reporter.count(), 0);
}

#[tokio::test(start_paused = true)]
async fn response_just_before_deadline_wins() {
    let h = harness();

    let response = h.app.oneshot(get_request("/edge")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "edge");

    sleep(Duration::from_millis(50)).await;
    assert_eq!(h.reporter.count(), 0);
}

#[tokio::test(start_paused = true)]
async fn disconnect_releases_deadline() {
    let h = harness();

    let pending = h.app.oneshot(get_request("/slow-op"));
    let abandoned = tokio::time::timeout(Duration::from_millis(50), pending).await;
    assert!(abandoned.is_err());

    sleep(Duration::from_millis(300)).await;
    assert_eq!(h.reporter.count(), 0);
    assert_eq!(h.slow_finished.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn concurrent_requests_have_independent_deadlines() {
    let h = harness();

    let fast = tokio::spawn(h.app.clone().oneshot(get_request("/fast")));
    let slow = tokio::spawn(h.app.clone().oneshot(get_request("/slow-op")));
    let edge = tokio::spawn(h.app.oneshot(get_request("/edge")));

    assert_eq!(fast.await.unwrap().unwrap().status(), StatusCode::OK);
    assert_eq!(slow.await.unwrap().unwrap().status(), StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(edge.await.unwrap().unwrap().status(), StatusCode::OK);
    assert_eq!(h.reporter.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn timeout_record_carries_correlation_id() {
    let h = harness();

    let request = Request::builder()
        .uri("/slow-op")
        .header("x-request-id", "agent-7")
        .body(Body::empty())
        .unwrap();
    let response = h.app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);

    let records = h.reporter.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].correlation_id, "agent-7");
    assert_eq!(records[0].kind, "request_timeout");
}

#[tokio::test(start_paused = true)]
async fn stalled_body_is_cut_at_deadline() {
    let h = harness();

    let start = Instant::now();
    let response = h.app.oneshot(get_request("/stream-stall")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(start.elapsed() < TIMEOUT);

    let read = axum::body::to_bytes(response.into_body(), usize::MAX).await;
    let elapsed = start.elapsed();
    assert!(read.is_err(), "stalled body was delivered: {read:?}");
    assert!(elapsed >= TIMEOUT, "cut early after {elapsed:?}");
    assert!(elapsed <= Duration::from_millis(150), "cut late after {elapsed:?}");

    assert_eq!(
        h.reporter.records(),
        vec![TimeoutRecord::new("GET", "/stream-stall", 100, "unknown")]
    );

    sleep(Duration::from_secs(2)).await;
    assert_eq!(h.reporter.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn streamed_body_within_deadline_is_delivered() {
    let h = harness();

    let response = h.app.oneshot(get_request("/stream-quick")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "early");

    sleep(Duration::from_millis(500)).await;
    assert_eq!(h.reporter.count(), 0);
}

#[tokio::test(start_paused = true)]
async fn dropped_body_releases_deadline() {
    let h = harness();

    let response = h.app.oneshot(get_request("/stream-stall")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    drop(response);

    sleep(Duration::from_secs(2)).await;
    assert_eq!(h.reporter.count(), 0);
}
