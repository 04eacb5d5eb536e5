//! Mutual TLS setup.
//!
//! The server presents its certificate chain and requires a client
//! certificate signed by the configured CA. Connections without one fail
//! the handshake before any HTTP is read.

use crate::domain::config::{ConfigError, TlsConfig};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::{RootCertStore, ServerConfig};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tokio_rustls::TlsAcceptor;
use tracing::debug;

fn tls_error(path: &Path, detail: impl std::fmt::Display) -> ConfigError {
    ConfigError::Tls(format!("{}: {detail}", path.display()))
}

fn open(path: &Path) -> Result<BufReader<File>, ConfigError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| tls_error(path, e))
}

/// Read every certificate in a PEM file.
pub fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, ConfigError> {
    let certs = rustls_pemfile::certs(&mut open(path)?)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| tls_error(path, e))?;
    if certs.is_empty() {
        return Err(tls_error(path, "no certificate found"));
    }
    Ok(certs)
}

/// Read the first private key in a PEM file.
pub fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, ConfigError> {
    rustls_pemfile::private_key(&mut open(path)?)
        .map_err(|e| tls_error(path, e))?
        .ok_or_else(|| tls_error(path, "no private key found"))
}

/// Build the rustls server config from PEM files.
pub fn server_config(tls: &TlsConfig) -> Result<Arc<ServerConfig>, ConfigError> {
    let cert_path = tls
        .cert_path
        .as_deref()
        .ok_or(ConfigError::MissingTls("certificate"))?;
    let key_path = tls
        .key_path
        .as_deref()
        .ok_or(ConfigError::MissingTls("private key"))?;
    let ca_path = tls
        .ca_path
        .as_deref()
        .ok_or(ConfigError::MissingTls("client CA"))?;

    let certs = load_certs(cert_path)?;
    let key = load_private_key(key_path)?;

    let mut roots = RootCertStore::empty();
    for ca in load_certs(ca_path)? {
        roots.add(ca).map_err(|e| tls_error(ca_path, e))?;
    }

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider.clone())
        .build()
        .map_err(|e| tls_error(ca_path, e))?;

    let mut config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| ConfigError::Tls(e.to_string()))?
        .with_client_cert_verifier(verifier)
        .with_single_cert(certs, key)
        .map_err(|e| tls_error(cert_path, e))?;
    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    debug!(cert = %cert_path.display(), ca = %ca_path.display(), "Loaded TLS material");
    Ok(Arc::new(config))
}

/// Acceptor for the listener.
pub fn acceptor(tls: &TlsConfig) -> Result<TlsAcceptor, ConfigError> {
    server_config(tls).map(TlsAcceptor::from)
}
