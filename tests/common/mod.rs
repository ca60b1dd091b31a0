//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::Router;
use ndc_gateway::config::GatewayConfig;
use ndc_gateway::guard::{TimeoutRecord, TimeoutReporter};
use ndc_gateway::{GatewayServer, Shutdown};
use tokio::net::TcpListener;

/// Serve `router` as a mock NDC upstream on an ephemeral port.
#[allow(dead_code)]
pub async fn start_mock_upstream(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    addr
}

/// Start the gateway on an ephemeral port. Trigger the returned
/// [`Shutdown`] to stop it.
#[allow(dead_code)]
pub async fn start_gateway(
    mut config: GatewayConfig,
) -> (SocketAddr, Shutdown, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    config.listener.bind_address = addr.to_string();

    let server = GatewayServer::new(config).unwrap();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let handle = tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    (addr, shutdown, handle)
}

/// An address nothing is listening on.
#[allow(dead_code)]
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

#[allow(dead_code)]
pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// Reporter that keeps every timeout record it receives.
#[allow(dead_code)]
#[derive(Debug, Default)]
pub struct RecordingReporter {
    records: Mutex<Vec<TimeoutRecord>>,
}

#[allow(dead_code)]
impl RecordingReporter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn records(&self) -> Vec<TimeoutRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl TimeoutReporter for RecordingReporter {
    fn report(&self, record: &TimeoutRecord) {
        self.records.lock().unwrap().push(record.clone());
    }
}
