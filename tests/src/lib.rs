//! # Cipherlink Test Suite
//!
//! End-to-end tests against a real listener: generated PKI, mutual TLS,
//! shared-secret auth and framed operations over HTTP/1.1.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── pki.rs          # rcgen CA, server and client certificates
//! ├── client.rs       # tokio-rustls + hyper client
//! ├── harness.rs      # service on an ephemeral port
//! └── integration/
//!     ├── transport.rs  # TLS, readiness signal, auth, status codes
//!     └── flows.rs      # operation round trips and key cache behaviour
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p cl-tests
//! cargo test -p cl-tests integration::transport::
//! ```

pub mod client;
pub mod harness;
pub mod integration;
pub mod pki;
