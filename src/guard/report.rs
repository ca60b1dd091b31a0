//! Timeout reporting sink.

use std::fmt;

use crate::observability::metrics;

/// Structured record emitted once per timed-out request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutRecord {
    /// Always `"request_timeout"`.
    pub kind: &'static str,
    pub method: String,
    pub path: String,
    pub timeout_ms: u64,
    pub correlation_id: String,
}

impl TimeoutRecord {
    pub const KIND: &'static str = "request_timeout";

    pub fn new(
        method: impl Into<String>,
        path: impl Into<String>,
        timeout_ms: u64,
        correlation_id: impl Into<String>,
    ) -> Self {
        Self {
            kind: Self::KIND,
            method: method.into(),
            path: path.into(),
            timeout_ms,
            correlation_id: correlation_id.into(),
        }
    }

    /// Operation identity used in the timeout failure, e.g. `GET /slow-op`.
    pub fn operation(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

/// Receives timeout records from the request guard.
///
/// Called from the deadline's timer task, at most once per request.
pub trait TimeoutReporter: Send + Sync + fmt::Debug {
    fn report(&self, record: &TimeoutRecord);
}

/// Default reporter: one `tracing` warning plus a timeout counter.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl TimeoutReporter for LogReporter {
    fn report(&self, record: &TimeoutRecord) {
        tracing::warn!(
            kind = record.kind,
            method = %record.method,
            path = %record.path,
            timeout_ms = record.timeout_ms,
            correlation_id = %record.correlation_id,
            "Request exceeded deadline"
        );
        metrics::record_timeout(&record.method);
    }
}
