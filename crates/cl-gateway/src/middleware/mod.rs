//! Middleware stack for the RPC endpoint.
//!
//! Layer order: Request → Tracing → Auth → Validation (body limit, framing) → Dispatcher
//!
//! Auth runs before the body is read, so an unauthorized request never
//! reaches framing or dispatch.

pub mod auth;
pub mod metrics;
pub mod tracing;
pub mod validation;

pub use auth::{constant_time_compare, AuthLayer};
pub use metrics::{Outcome, RequestTimer, RpcMetrics};
pub use tracing::TracingLayer;
pub use validation::{read_body_with_limit, ValidationLayer};

use crate::domain::config::GatewayConfig;
use std::sync::Arc;

/// Middleware stack builder
pub struct MiddlewareStack {
    pub tracing: TracingLayer,
    pub auth: AuthLayer,
    pub validation: ValidationLayer,
    pub metrics: Arc<RpcMetrics>,
}

impl MiddlewareStack {
    /// Create middleware stack from gateway config. An absent secret yields
    /// a layer nothing can pass; startup validation rejects that config
    /// before any listener exists.
    pub fn from_config(config: &GatewayConfig, metrics: Arc<RpcMetrics>) -> Self {
        let secret = config.auth.header.clone().unwrap_or_default();
        Self {
            tracing: TracingLayer::new(),
            auth: AuthLayer::new(secret).with_metrics(Arc::clone(&metrics)),
            validation: ValidationLayer::new(config.limits.max_request_size)
                .with_metrics(Arc::clone(&metrics)),
            metrics,
        }
    }

    /// Get shared metrics
    pub fn metrics(&self) -> Arc<RpcMetrics> {
        Arc::clone(&self.metrics)
    }
}
