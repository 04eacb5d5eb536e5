//! # Cipherlink Telemetry
//!
//! Structured logging for the Cipherlink node.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cl_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() {
//!     init_telemetry(&TelemetryConfig::from_env()).expect("Failed to init telemetry");
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `CL_SERVICE_NAME` | `cipherlink` | Service name in log output |
//! | `CL_LOG_LEVEL` / `RUST_LOG` | `info` | Log filter |
//! | `CL_CONSOLE_OUTPUT` | `true` | Emit logs at all |
//! | `CL_JSON_LOGS` | `false` | JSON instead of pretty output |

#![warn(missing_docs)]

mod config;
mod tracing_setup;

pub use config::TelemetryConfig;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// Log filter directive could not be parsed
    #[error("Invalid log filter: {0}")]
    Filter(String),

    /// A global subscriber is already installed
    #[error("Failed to install subscriber: {0}")]
    SubscriberInit(String),
}

/// Initialize logging for the process.
///
/// Fails if the filter is invalid or a subscriber is already set.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    tracing_setup::init_tracing(config)
}

/// Span around one RPC operation, with the operation name as a field.
#[macro_export]
macro_rules! operation_span {
    ($op:expr $(, $($field:tt)*)?) => {
        tracing::info_span!("rpc_operation", op = $op $(, $($field)*)?)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "cipherlink");
        assert!(!config.json_logs);
    }

    #[test]
    fn test_operation_span_macro() {
        let _span = operation_span!("decryptMsg", size = 12usize);
    }
}
