//! Body limit and request framing.
//!
//! POST bodies are read up to the configured limit and split into a
//! [`RequestFrame`], which is handed to the dispatcher as a request
//! extension. Oversize and malformed bodies are answered with 400 here.

use crate::domain::frame::RequestFrame;
use crate::middleware::metrics::{Outcome, RpcMetrics};
use crate::ApiError;
use axum::{
    body::Body,
    http::{header, Method, Request},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use std::sync::Arc;
use tower::{Layer, Service};
use tracing::warn;

/// Validation layer
#[derive(Clone)]
pub struct ValidationLayer {
    max_request_size: usize,
    metrics: Option<Arc<RpcMetrics>>,
}

impl ValidationLayer {
    pub fn new(max_request_size: usize) -> Self {
        Self {
            max_request_size,
            metrics: None,
        }
    }

    /// Count rejections in `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<RpcMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

impl<S> Layer<S> for ValidationLayer {
    type Service = ValidationService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ValidationService {
            inner,
            max_request_size: self.max_request_size,
            metrics: self.metrics.clone(),
        }
    }
}

/// Validation service
#[derive(Clone)]
pub struct ValidationService<S> {
    inner: S,
    max_request_size: usize,
    metrics: Option<Arc<RpcMetrics>>,
}

impl<S> Service<Request<Body>> for ValidationService<S>
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
        let max_request_size = self.max_request_size;
        let metrics = self.metrics.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            if req.method() != Method::POST {
                return inner.call(req).await;
            }

            let (mut parts, body) = req.into_parts();
            match read_frame(&parts.headers, body, max_request_size).await {
                Ok(frame) => {
                    parts.extensions.insert(frame);
                    inner.call(Request::from_parts(parts, Body::empty())).await
                }
                Err(e) => {
                    warn!(error = %e, "Rejected request body");
                    if let Some(metrics) = metrics {
                        metrics.record_request(Outcome::from(e.kind), 0);
                    }
                    Ok(e.into_response())
                }
            }
        })
    }
}

async fn read_frame(
    headers: &axum::http::HeaderMap,
    body: Body,
    max_request_size: usize,
) -> Result<RequestFrame, ApiError> {
    // content-length fast path
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > max_request_size) {
        return Err(ApiError::too_large(max_request_size));
    }

    let bytes = read_body_with_limit(body, max_request_size).await?;
    RequestFrame::decode(bytes)
}

/// Read body with size limit
pub async fn read_body_with_limit(body: Body, max_size: usize) -> Result<Bytes, ApiError> {
    use axum::body::to_bytes;

    to_bytes(body, max_size)
        .await
        .map_err(|_| ApiError::too_large(max_size))
}
