//! Gateway configuration with validation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Lowest port a host application may bind without privileges.
pub const MIN_UNPRIVILEGED_PORT: u16 = 1024;

/// Longest idle window the key cache accepts.
pub const MAX_KEY_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Main gateway configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration
    pub server: ServerConfig,
    /// Mutual TLS material
    pub tls: TlsConfig,
    /// Shared-secret authorization
    pub auth: AuthConfig,
    /// Request limits
    pub limits: LimitsConfig,
    /// Unlocked key cache
    pub key_cache: KeyCacheConfig,
}

impl GatewayConfig {
    /// Validate configuration.
    ///
    /// Missing TLS material or a missing secret is fatal: the service must
    /// not start serving without them.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.server.host.is_loopback() {
            return Err(ConfigError::NonLoopbackHost(self.server.host));
        }

        if self.server.port != 0 && self.server.port < MIN_UNPRIVILEGED_PORT {
            return Err(ConfigError::PrivilegedPort(self.server.port));
        }

        if self.tls.cert_path.is_none() {
            return Err(ConfigError::MissingTls("certificate"));
        }
        if self.tls.key_path.is_none() {
            return Err(ConfigError::MissingTls("private key"));
        }
        if self.tls.ca_path.is_none() {
            return Err(ConfigError::MissingTls("client CA"));
        }

        match &self.auth.header {
            Some(secret) if !secret.is_empty() => {}
            _ => return Err(ConfigError::MissingSecret),
        }

        if self.limits.max_request_size == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_request_size cannot be 0".into(),
            ));
        }

        let ttl = self.key_cache.ttl;
        if self.key_cache.mode == KeyCacheMode::Sliding
            && (ttl.is_zero() || ttl > MAX_KEY_CACHE_TTL)
        {
            return Err(ConfigError::InvalidTtl);
        }

        Ok(())
    }

    /// Socket address the listener binds to.
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.server.host, self.server.port)
    }
}

/// Listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address, must be loopback
    pub host: IpAddr,
    /// Port (0 = ephemeral)
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
        }
    }
}

/// PEM file locations for mutual TLS
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    /// Server certificate chain
    pub cert_path: Option<PathBuf>,
    /// Server private key
    pub key_path: Option<PathBuf>,
    /// Trust anchor for client certificates
    pub ca_path: Option<PathBuf>,
}

/// Shared-secret configuration
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Exact value the `Authorization` header must carry
    pub header: Option<String>,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("header", &self.header.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Request limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum request body in bytes
    pub max_request_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_request_size: 64 * 1024 * 1024,
        }
    }
}

/// How the key cache forgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyCacheMode {
    /// Wipe after `ttl` without access
    Sliding,
    /// Only explicit flushes clear the cache
    FlushOnly,
}

impl std::str::FromStr for KeyCacheMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sliding" => Ok(Self::Sliding),
            "flush_only" | "flush-only" => Ok(Self::FlushOnly),
            other => Err(ConfigError::Invalid(format!("unknown key cache mode {other}"))),
        }
    }
}

/// Key cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyCacheConfig {
    /// Expiry mode
    pub mode: KeyCacheMode,
    /// Idle time before the whole cache is wiped
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
}

impl Default for KeyCacheConfig {
    fn default() -> Self {
        Self {
            mode: KeyCacheMode::Sliding,
            ttl: Duration::from_secs(120),
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Listener host is not a loopback address
    #[error("host {0} is not a loopback address")]
    NonLoopbackHost(IpAddr),
    /// Port below 1024
    #[error("port {0} is privileged; use 0 or a port >= 1024")]
    PrivilegedPort(u16),
    /// A TLS file is not configured
    #[error("missing TLS {0}")]
    MissingTls(&'static str),
    /// The shared secret is not configured
    #[error("missing auth header secret")]
    MissingSecret,
    /// Invalid size limit
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
    /// Sliding expiry needs a TTL in (0, 24h]
    #[error("key cache ttl must be greater than zero and at most 24h")]
    InvalidTtl,
    /// TLS material could not be loaded
    #[error("TLS error: {0}")]
    Tls(String),
    /// General configuration error
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Parse `"90s"`, `"500ms"`, `"2m"` or plain seconds.
pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
    humantime_serde::parse_duration(s).map_err(|e| ConfigError::Invalid(e.to_string()))
}

/// Humantime serde module for Duration serialization
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_millis() == 0 {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        } else {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub fn parse_duration(s: &str) -> Result<Duration, &'static str> {
        let s = s.trim();
        // "ms" before "s" and "m"
        if let Some(ms) = s.strip_suffix("ms") {
            ms.trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| "invalid milliseconds")
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid seconds")
        } else if let Some(mins) = s.strip_suffix('m') {
            mins.trim()
                .parse::<u64>()
                .ok()
                .and_then(|m| m.checked_mul(60))
                .map(Duration::from_secs)
                .ok_or("invalid minutes")
        } else {
            // Try parsing as plain seconds
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid duration format")
        }
    }
}
