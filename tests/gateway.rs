//! End-to-end tests: live gateway in front of a mock NDC upstream.

use std::time::{Duration, Instant};

use axum::{
    body::Bytes,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{any, get},
    Router,
};
use ndc_gateway::config::GatewayConfig;

mod common;

async fn echo(headers: HeaderMap, body: Bytes) -> impl IntoResponse {
    let seen = headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("none")
        .to_string();
    ([("x-upstream-saw-request-id", seen)], body)
}

async fn mock_ndc() -> std::net::SocketAddr {
    common::start_mock_upstream(
        Router::new()
            .route("/ndc/OrderCreate", any(echo))
            .route(
                "/ndc/AirShopping",
                get(|| async {
                    tokio::time::sleep(Duration::from_millis(400)).await;
                    "<AirShoppingRS/>"
                }),
            ),
    )
    .await
}

fn config_for(upstream: std::net::SocketAddr, timeout_ms: u64) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.upstream.base_url = Some(format!("http://{upstream}/ndc"));
    config.guard.timeout_ms = timeout_ms;
    config.observability.metrics_enabled = false;
    config
}

#[tokio::test]
async fn forwards_body_and_request_id() {
    let upstream = mock_ndc().await;
    let (addr, shutdown, _) = common::start_gateway(config_for(upstream, 2_000)).await;

    let res = common::client()
        .post(format!("http://{addr}/api/OrderCreate"))
        .header("content-type", "application/xml")
        .body("<OrderCreateRQ/>")
        .send()
        .await
        .expect("gateway unreachable");

    assert_eq!(res.status(), StatusCode::OK);
    let request_id = res.headers()["x-request-id"].to_str().unwrap().to_string();
    assert_eq!(res.headers()["x-upstream-saw-request-id"], request_id.as_str());
    assert_eq!(res.text().await.unwrap(), "<OrderCreateRQ/>");

    shutdown.trigger();
}

#[tokio::test]
async fn slow_upstream_yields_gateway_timeout() {
    let upstream = mock_ndc().await;
    let (addr, shutdown, _) = common::start_gateway(config_for(upstream, 100)).await;

    let start = Instant::now();
    let res = common::client()
        .get(format!("http://{addr}/api/AirShopping"))
        .header("x-request-id", "agent-timeout")
        .send()
        .await
        .unwrap();
    let elapsed = start.elapsed();

    assert_eq!(res.status(), StatusCode::GATEWAY_TIMEOUT);
    assert!(elapsed >= Duration::from_millis(100));
    assert!(elapsed < Duration::from_millis(400), "waited for upstream: {elapsed:?}");
    assert_eq!(res.headers()["x-request-id"], "agent-timeout");

    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "request_timeout");
    assert_eq!(body["operation"], "GET /api/AirShopping");
    assert_eq!(body["timeout_ms"], 100);

    shutdown.trigger();
}

#[tokio::test]
async fn health_endpoints_answer_with_tight_deadline() {
    let upstream = mock_ndc().await;
    let (addr, shutdown, _) = common::start_gateway(config_for(upstream, 1)).await;
    let client = common::client();

    let health = client.get(format!("http://{addr}/health")).send().await.unwrap();
    assert_eq!(health.status(), StatusCode::OK);

    let ready: serde_json::Value = client
        .get(format!("http://{addr}/ready"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(ready["status"], "ready");
    assert_eq!(ready["upstream"], format!("http://{upstream}/ndc"));

    shutdown.trigger();
}

#[tokio::test]
async fn unreachable_upstream_is_bad_gateway() {
    let dead = common::closed_port().await;
    let (addr, shutdown, _) = common::start_gateway(config_for(dead, 2_000)).await;

    let res = common::client()
        .get(format!("http://{addr}/api/OrderRetrieve"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "upstream_error");

    shutdown.trigger();
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let upstream = mock_ndc().await;
    let mut config = config_for(upstream, 2_000);
    config.security.max_body_size = 16;
    let (addr, shutdown, _) = common::start_gateway(config).await;

    let res = common::client()
        .post(format!("http://{addr}/api/OrderCreate"))
        .body("x".repeat(64))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);

    shutdown.trigger();
}

#[tokio::test]
async fn shutdown_stops_server() {
    let upstream = mock_ndc().await;
    let (_, shutdown, handle) = common::start_gateway(config_for(upstream, 2_000)).await;

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server did not stop")
        .unwrap();
}
