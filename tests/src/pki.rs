//! Throwaway certificate authority for the suite.
//!
//! One CA signs the server and the trusted client. A second, unrelated CA
//! signs the "rogue" client the server must refuse.

use anyhow::Result;
use cl_gateway::domain::config::TlsConfig;
use rcgen::{
    BasicConstraints, Certificate, CertificateParams, ExtendedKeyUsagePurpose, IsCa, KeyPair,
};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Certificate chain plus private key.
pub struct Identity {
    pub certs: Vec<CertificateDer<'static>>,
    pub key: PrivateKeyDer<'static>,
}

impl Identity {
    fn new(cert: &Certificate, key: &KeyPair) -> Self {
        Self {
            certs: vec![cert.der().clone()],
            key: PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key.serialize_der())),
        }
    }
}

/// Generated PKI with PEM files on disk.
pub struct TestPki {
    dir: TempDir,
    /// Trust anchor for both sides
    pub ca: CertificateDer<'static>,
    /// Client signed by the trusted CA
    pub client: Identity,
    /// Client signed by an unrelated CA
    pub rogue_client: Identity,
}

fn new_ca() -> Result<(Certificate, KeyPair)> {
    let key = KeyPair::generate()?;
    let mut params = CertificateParams::new(Vec::<String>::new())?;
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    Ok((params.self_signed(&key)?, key))
}

fn leaf(
    names: Vec<String>,
    usage: ExtendedKeyUsagePurpose,
    issuer: &Certificate,
    issuer_key: &KeyPair,
) -> Result<(Certificate, KeyPair)> {
    let key = KeyPair::generate()?;
    let mut params = CertificateParams::new(names)?;
    params.extended_key_usages = vec![usage];
    Ok((params.signed_by(&key, issuer, issuer_key)?, key))
}

fn write(dir: &Path, name: &str, contents: &str) -> Result<PathBuf> {
    let path = dir.join(name);
    std::fs::write(&path, contents)?;
    Ok(path)
}

impl TestPki {
    /// Generate everything and write the server side to a temp dir.
    pub fn generate() -> Result<Self> {
        let dir = tempfile::tempdir()?;
        let (ca, ca_key) = new_ca()?;
        let (server, server_key) = leaf(
            vec!["localhost".to_string()],
            ExtendedKeyUsagePurpose::ServerAuth,
            &ca,
            &ca_key,
        )?;
        let (client, client_key) = leaf(
            vec!["cipherlink-host".to_string()],
            ExtendedKeyUsagePurpose::ClientAuth,
            &ca,
            &ca_key,
        )?;

        let (rogue_ca, rogue_ca_key) = new_ca()?;
        let (rogue, rogue_key) = leaf(
            vec!["cipherlink-host".to_string()],
            ExtendedKeyUsagePurpose::ClientAuth,
            &rogue_ca,
            &rogue_ca_key,
        )?;

        write(dir.path(), "ca.pem", &ca.pem())?;
        write(dir.path(), "server.pem", &server.pem())?;
        write(dir.path(), "server.key", &server_key.serialize_pem())?;

        Ok(Self {
            ca: ca.der().clone(),
            client: Identity::new(&client, &client_key),
            rogue_client: Identity::new(&rogue, &rogue_key),
            dir,
        })
    }

    /// Server-side TLS paths.
    pub fn tls_config(&self) -> TlsConfig {
        TlsConfig {
            cert_path: Some(self.dir.path().join("server.pem")),
            key_path: Some(self.dir.path().join("server.key")),
            ca_path: Some(self.dir.path().join("ca.pem")),
        }
    }
}
