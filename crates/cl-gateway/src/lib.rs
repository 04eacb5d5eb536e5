//! Cipherlink Gateway - loopback RPC surface for message crypto operations.
//!
//! The host application talks to this crate over a single mutually
//! authenticated TLS connection, sending framed requests to `POST /`.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     CIPHERLINK GATEWAY                        │
//! ├──────────────────────────────────────────────────────────────┤
//! │   TLS listener (127.0.0.1, client certificate required)       │
//! │                          │                                    │
//! │   ┌──────────────────────┴───────────────────────┐            │
//! │   │               Middleware Stack                │            │
//! │   │   Tracing → Auth → Validation (size, frame)   │            │
//! │   └──────────────────────┬───────────────────────┘            │
//! │                          │                                    │
//! │   ┌──────────────────────┴───────────────────────┐            │
//! │   │   Dispatcher: registry → validate → handler   │            │
//! │   └──────────┬───────────────────────┬───────────┘            │
//! │              │                       │                        │
//! │        ┌─────┴─────┐          ┌──────┴──────┐                 │
//! │        │ KeyCache  │          │ CryptoEngine│                 │
//! │        └───────────┘          └─────────────┘                 │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Wire format
//!
//! - Request: `<operation>\n<control JSON>\n<payload>`
//! - Response: `<result JSON>\n<payload>`
//!
//! Expected crypto failures answer 200 with `success:false`. Protocol and
//! validation errors answer 400, a wrong secret 401, and faults 500 with the
//! detail withheld.
//!
//! # Usage
//!
//! ```ignore
//! use cl_gateway::{CipherlinkService, GatewayConfig, StdoutSignal};
//!
//! let service = CipherlinkService::new(config, Arc::new(NativeEngine), Arc::new(StdoutSignal))?;
//! let handle = service.start().await?;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod cache;
pub mod domain;
pub mod middleware;
pub mod ports;
pub mod router;
pub mod rpc;
pub mod service;
pub mod tls;

// Re-exports for public API
pub use cache::{ExpiryMode, KeyCache, KeyCacheStats};
pub use domain::config::GatewayConfig;
pub use domain::config::ConfigError;
pub use domain::error::{ApiError, ApiResult, GatewayError};
pub use domain::frame::{RequestFrame, ResponseFrame};
pub use domain::operations::{get_operation_info, operation_names, Operation, OperationInfo};
pub use middleware::RpcMetrics;
pub use ports::{ChannelSignal, ContactStore, HostSignal, NoContacts, StdoutSignal};
pub use router::{build_router, AppState};
pub use service::{CipherlinkService, ServiceHandle};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
