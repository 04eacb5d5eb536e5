//! Gateway error types and their HTTP status mapping.
//!
//! | Kind | Status | Body |
//! |------|--------|------|
//! | auth | 401 + `WWW-Authenticate` | `{"error":{"message":"Wrong Authorization"}}` |
//! | framing / client | 400 | `{"error":{"message":<detail>}}` |
//! | internal | 500 | `{"error":{"message":"internal error"}}` (detail logged only) |
//!
//! Every error body is a response frame with an empty payload.

use crate::domain::config::ConfigError;
use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::fmt;

const INTERNAL_MESSAGE: &str = "internal error";

/// Error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or wrong shared secret
    Auth,
    /// Body does not have the required delimiters
    Framing,
    /// Well-framed but unacceptable request
    Client,
    /// Unexpected fault
    Internal,
}

/// Per-request error, rendered by the dispatcher
#[derive(Debug, Clone)]
pub struct ApiError {
    /// Classification
    pub kind: ErrorKind,
    /// Message sent to the caller
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: ErrorMessage<'a>,
}

#[derive(Serialize)]
struct ErrorMessage<'a> {
    message: &'a str,
}

impl ApiError {
    /// Create a new API error
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Missing or wrong `Authorization` header
    pub fn unauthorized() -> Self {
        Self::new(ErrorKind::Auth, "Wrong Authorization")
    }

    /// Request body is not a valid frame
    pub fn framing(details: impl Into<String>) -> Self {
        Self::new(ErrorKind::Framing, details)
    }

    /// Client error with a caller-visible message
    pub fn client(details: impl Into<String>) -> Self {
        Self::new(ErrorKind::Client, details)
    }

    /// Operation name not in the registry
    pub fn unknown_operation(name: &str) -> Self {
        Self::client(format!("unknown endpoint: {name}"))
    }

    /// Control segment failed validation
    pub fn wrong_structure(operation: &str) -> Self {
        Self::client(format!("Wrong request structure for {operation}"))
    }

    /// Path or method not served
    pub fn unknown_path(path: &str) -> Self {
        Self::client(format!("unknown path {path}"))
    }

    /// Body over the configured limit
    pub fn too_large(limit: usize) -> Self {
        Self::client(format!("request body exceeds {limit} bytes"))
    }

    /// Internal error. The detail is kept for logging, never sent.
    pub fn internal(details: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, details)
    }

    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self.kind {
            ErrorKind::Auth => StatusCode::UNAUTHORIZED,
            ErrorKind::Framing | ErrorKind::Client => StatusCode::BAD_REQUEST,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message the caller sees
    pub fn public_message(&self) -> &str {
        match self.kind {
            ErrorKind::Internal => INTERNAL_MESSAGE,
            _ => &self.message,
        }
    }

    /// Encoded response frame: result line plus an empty payload
    pub fn to_frame(&self) -> Vec<u8> {
        let body = ErrorBody {
            error: ErrorMessage {
                message: self.public_message(),
            },
        };
        let mut out = serde_json::to_vec(&body).unwrap_or_default();
        out.push(b'\n');
        out
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.kind, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.to_frame()));
        *response.status_mut() = self.status();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/octet-stream"),
        );
        if self.kind == ErrorKind::Auth {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static(r#"Basic realm="cipherlink""#),
            );
        }
        response
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::internal(format!("json: {e}"))
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Service-level errors (startup, bind)
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Server socket bind error
    #[error("server bind error: {0}")]
    Bind(String),
}
