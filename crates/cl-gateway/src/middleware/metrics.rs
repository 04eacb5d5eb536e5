//! Request counters, reported through the `version` operation.

use crate::domain::error::ErrorKind;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// How a request ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// 200 with a successful result
    Success,
    /// 200 carrying `success:false`
    CryptoFailure,
    /// 400
    ClientError,
    /// 401
    AuthFailure,
    /// 500
    InternalError,
}

impl From<ErrorKind> for Outcome {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::Auth => Outcome::AuthFailure,
            ErrorKind::Framing | ErrorKind::Client => Outcome::ClientError,
            ErrorKind::Internal => Outcome::InternalError,
        }
    }
}

/// RPC metrics
#[derive(Default)]
pub struct RpcMetrics {
    pub requests_total: AtomicU64,
    pub requests_success: AtomicU64,
    pub crypto_failures: AtomicU64,
    pub client_errors: AtomicU64,
    pub auth_failures: AtomicU64,
    pub internal_errors: AtomicU64,

    // Latency tracking (simplified - in production use histograms)
    pub total_latency_ms: AtomicU64,
    pub request_count_for_latency: AtomicU64,
}

impl RpcMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finished request
    pub fn record_request(&self, outcome: Outcome, latency_ms: u64) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);

        let counter = match outcome {
            Outcome::Success => &self.requests_success,
            Outcome::CryptoFailure => &self.crypto_failures,
            Outcome::ClientError => &self.client_errors,
            Outcome::AuthFailure => &self.auth_failures,
            Outcome::InternalError => &self.internal_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        self.total_latency_ms
            .fetch_add(latency_ms, Ordering::Relaxed);
        self.request_count_for_latency
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Record a request rejected before dispatch
    pub fn record_auth_failure(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        self.auth_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get average latency in ms
    pub fn average_latency_ms(&self) -> f64 {
        let total = self.total_latency_ms.load(Ordering::Relaxed);
        let count = self.request_count_for_latency.load(Ordering::Relaxed);
        if count == 0 {
            0.0
        } else {
            total as f64 / count as f64
        }
    }

    /// Export metrics as JSON
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "requests": {
                "total": self.requests_total.load(Ordering::Relaxed),
                "success": self.requests_success.load(Ordering::Relaxed),
                "crypto_failures": self.crypto_failures.load(Ordering::Relaxed),
                "client_errors": self.client_errors.load(Ordering::Relaxed),
                "auth_failures": self.auth_failures.load(Ordering::Relaxed),
                "internal_errors": self.internal_errors.load(Ordering::Relaxed),
            },
            "latency": {
                "average_ms": self.average_latency_ms(),
            }
        })
    }
}

/// Request timing helper
pub struct RequestTimer {
    start: Instant,
    metrics: Arc<RpcMetrics>,
}

impl RequestTimer {
    pub fn new(metrics: Arc<RpcMetrics>) -> Self {
        Self {
            start: Instant::now(),
            metrics,
        }
    }

    pub fn finish(self, outcome: Outcome) {
        let latency_ms = self.start.elapsed().as_millis() as u64;
        self.metrics.record_request(outcome, latency_ms);
    }
}
