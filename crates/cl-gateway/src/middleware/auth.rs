//! Shared-secret authorization.
//!
//! The `Authorization` header must equal the configured string exactly.
//! Anything else is answered with 401 before the body is read.

use crate::middleware::metrics::RpcMetrics;
use crate::ApiError;
use axum::{
    body::Body,
    http::{header, Request},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tower::{Layer, Service};
use tracing::{debug, warn};

/// Authentication layer
#[derive(Clone)]
pub struct AuthLayer {
    secret: Arc<str>,
    metrics: Option<Arc<RpcMetrics>>,
}

impl AuthLayer {
    pub fn new(secret: impl Into<Arc<str>>) -> Self {
        Self {
            secret: secret.into(),
            metrics: None,
        }
    }

    /// Count rejections in `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<RpcMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            inner,
            secret: Arc::clone(&self.secret),
            metrics: self.metrics.clone(),
        }
    }
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService<S> {
    inner: S,
    secret: Arc<str>,
    metrics: Option<Arc<RpcMetrics>>,
}

impl<S> Service<Request<Body>> for AuthService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let authorized = check_authorization(&req, &self.secret);
        let metrics = self.metrics.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            if !authorized {
                warn!(
                    has_header = req.headers().contains_key(header::AUTHORIZATION),
                    "Rejected request with wrong authorization"
                );
                if let Some(metrics) = metrics {
                    metrics.record_auth_failure();
                }
                return Ok(ApiError::unauthorized().into_response());
            }

            debug!("Request authorized");
            inner.call(req).await
        })
    }
}

/// Exact match of the `Authorization` header against the secret
fn check_authorization<B>(req: &Request<B>, secret: &str) -> bool {
    if secret.is_empty() {
        return false;
    }
    req.headers()
        .get(header::AUTHORIZATION)
        .map(|value| constant_time_compare(value.as_bytes(), secret.as_bytes()))
        .unwrap_or(false)
}

/// Constant-time byte comparison to prevent timing attacks
///
/// Both inputs are padded to the longer length with different bytes, so a
/// length mismatch never short-circuits.
pub fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    use subtle::ConstantTimeEq;

    let max_len = std::cmp::max(a.len(), b.len());

    let mut a_padded = vec![0u8; max_len];
    let mut b_padded = vec![0xFFu8; max_len];

    a_padded[..a.len()].copy_from_slice(a);
    b_padded[..b.len()].copy_from_slice(b);

    let lengths_equal = a.len().ct_eq(&b.len());
    let contents_equal = a_padded.ct_eq(&b_padded);

    (lengths_equal & contents_equal).into()
}
