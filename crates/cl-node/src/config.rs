//! Configuration loading: optional TOML file, then environment overrides.

use anyhow::{Context, Result};
use cl_gateway::domain::config::{parse_duration, KeyCacheMode};
use cl_gateway::GatewayConfig;
use std::path::{Path, PathBuf};
use tracing::info;

/// Variable naming the TOML file.
pub const CONFIG_ENV: &str = "CL_CONFIG";

/// Load from `CL_CONFIG` (if set) and the `CL_*` overrides.
pub fn load_config() -> Result<GatewayConfig> {
    load_with(|name| std::env::var(name).ok())
}

/// [`load_config`] with a custom variable source.
pub fn load_with<F>(lookup: F) -> Result<GatewayConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match lookup(CONFIG_ENV) {
        Some(path) => read_file(Path::new(&path))?,
        None => GatewayConfig::default(),
    };
    apply_overrides(&mut config, lookup)?;
    Ok(config)
}

/// Parse a TOML config file.
pub fn read_file(path: &Path) -> Result<GatewayConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    let config = toml::from_str(&text)
        .with_context(|| format!("parsing config file {}", path.display()))?;
    info!(path = %path.display(), "Loaded config file");
    Ok(config)
}

/// Apply `CL_*` environment overrides.
pub fn apply_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(port) = lookup("CL_PORT") {
        config.server.port = port
            .trim()
            .parse()
            .with_context(|| format!("CL_PORT={port} is not a port number"))?;
    }
    if let Some(header) = lookup("CL_AUTH_HEADER") {
        config.auth.header = Some(header);
    }
    if let Some(path) = lookup("CL_TLS_CERT") {
        config.tls.cert_path = Some(PathBuf::from(path));
    }
    if let Some(path) = lookup("CL_TLS_KEY") {
        config.tls.key_path = Some(PathBuf::from(path));
    }
    if let Some(path) = lookup("CL_TLS_CA") {
        config.tls.ca_path = Some(PathBuf::from(path));
    }
    if let Some(ttl) = lookup("CL_KEY_CACHE_TTL") {
        config.key_cache.ttl = parse_duration(&ttl).context("CL_KEY_CACHE_TTL")?;
    }
    if let Some(mode) = lookup("CL_KEY_CACHE_MODE") {
        config.key_cache.mode = mode.parse::<KeyCacheMode>().context("CL_KEY_CACHE_MODE")?;
    }
    if let Some(size) = lookup("CL_MAX_REQUEST_SIZE") {
        config.limits.max_request_size = size
            .trim()
            .parse()
            .with_context(|| format!("CL_MAX_REQUEST_SIZE={size} is not a byte count"))?;
    }
    Ok(())
}
