//! HTTP routing and operation dispatch.
//!
//! `POST /` is the RPC endpoint, `GET /` a small status page. Every other
//! path or method is a 400. All per-request errors are turned into
//! responses here.

use crate::domain::error::{ApiError, ApiResult};
use crate::domain::frame::RequestFrame;
use crate::domain::operations::get_operation_info;
use crate::domain::requests::validate;
use crate::middleware::{MiddlewareStack, Outcome, RequestTimer, RpcMetrics};
use crate::rpc::{Handled, RpcHandlers};
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Uri},
    response::{Html, IntoResponse, Response},
    routing::get,
    Extension, Router,
};
use std::sync::Arc;
use tracing::{error, info, Instrument};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub rpc_handlers: Arc<RpcHandlers>,
    pub metrics: Arc<RpcMetrics>,
}

/// Build the router with the full middleware stack.
pub fn build_router(state: AppState, middleware: MiddlewareStack) -> Router {
    Router::new()
        .route(
            "/",
            get(status_page).post(dispatch).fallback(unknown_path),
        )
        .route_layer(middleware.validation)
        .fallback(unknown_path)
        .layer(middleware.auth)
        .layer(middleware.tracing)
        .with_state(state)
}

async fn status_page(State(state): State<AppState>) -> Html<String> {
    let stats = state.rpc_handlers.cache().stats();
    Html(format!(
        "<html><head><title>Cipherlink</title></head><body>\
         <h1>Cipherlink {}</h1>\
         <p>Send <code>POST /</code> requests as <code>operation\\ncontrol\\npayload</code>.</p>\
         <p>Unlocked keys cached: {}</p>\
         </body></html>",
        crate::VERSION,
        stats.unlocked_entries,
    ))
}

async fn unknown_path(State(state): State<AppState>, uri: Uri) -> ApiError {
    state.metrics.record_request(Outcome::ClientError, 0);
    ApiError::unknown_path(uri.path())
}

async fn dispatch(
    State(state): State<AppState>,
    frame: Option<Extension<RequestFrame>>,
) -> Response {
    let timer = RequestTimer::new(Arc::clone(&state.metrics));

    let result = match frame {
        Some(Extension(frame)) => process(&state, frame).await,
        None => Err(ApiError::internal("request reached dispatch without a frame")),
    };

    match result.and_then(|handled| encode(handled)) {
        Ok((body, outcome)) => {
            timer.finish(outcome);
            octet_stream(body)
        }
        Err(e) => {
            match e.kind {
                crate::domain::error::ErrorKind::Internal => {
                    error!(error = %e.message, "Request failed")
                }
                _ => info!(error = %e.message, "Request rejected"),
            }
            timer.finish(Outcome::from(e.kind));
            e.into_response()
        }
    }
}

/// Resolve, validate and run one operation.
async fn process(state: &AppState, frame: RequestFrame) -> ApiResult<Handled> {
    let info = get_operation_info(&frame.operation)
        .ok_or_else(|| ApiError::unknown_operation(&frame.operation))?;

    let span = cl_telemetry::operation_span!(info.name, payload_len = frame.payload.len());
    async move {
        let request = validate(info.operation, &frame.control)?;
        let handled = state.rpc_handlers.handle(request, frame.payload).await?;
        info!(outcome = ?handled.outcome, "Operation finished");
        Ok(handled)
    }
    .instrument(span)
    .await
}

fn encode(handled: Handled) -> ApiResult<(Vec<u8>, Outcome)> {
    Ok((handled.frame.encode()?, handled.outcome))
}

fn octet_stream(body: Vec<u8>) -> Response {
    let mut response = Response::new(Body::from(body));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    response
}
