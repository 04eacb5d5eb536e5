//! Host-side client: mutual TLS plus HTTP/1.1 over hyper.

use crate::pki::{Identity, TestPki};
use anyhow::{Context, Result};
use bytes::Bytes;
use cl_gateway::{RequestFrame, ResponseFrame};
use http_body_util::{BodyExt, Full};
use hyper::header::{AUTHORIZATION, HOST};
use hyper::{HeaderMap, Method, Request, StatusCode};
use hyper_util::rt::TokioIo;
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

/// Raw HTTP response.
#[derive(Debug)]
pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Reply {
    /// Decode the body as a response frame.
    pub fn frame(&self) -> Result<ResponseFrame> {
        ResponseFrame::decode(&self.body).map_err(|e| anyhow::anyhow!(e.message))
    }
}

/// One client per test; every request opens a fresh connection.
pub struct TestClient {
    addr: SocketAddr,
    connector: TlsConnector,
    secret: Option<String>,
}

impl TestClient {
    /// Client presenting `identity`, or no certificate at all.
    pub fn new(
        pki: &TestPki,
        identity: Option<&Identity>,
        addr: SocketAddr,
        secret: Option<&str>,
    ) -> Result<Self> {
        let mut roots = RootCertStore::empty();
        roots.add(pki.ca.clone())?;

        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let builder = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()?
            .with_root_certificates(roots);
        let mut config = match identity {
            Some(identity) => builder
                .with_client_auth_cert(identity.certs.clone(), identity.key.clone_key())?,
            None => builder.with_no_client_auth(),
        };
        config.alpn_protocols = vec![b"http/1.1".to_vec()];

        Ok(Self {
            addr,
            connector: TlsConnector::from(Arc::new(config)),
            secret: secret.map(str::to_string),
        })
    }

    /// Send one request with the configured secret.
    pub async fn send(&self, method: Method, path: &str, body: Vec<u8>) -> Result<Reply> {
        let tcp = TcpStream::connect(self.addr).await?;
        let server_name = ServerName::try_from("localhost")?;
        let tls = self.connector.connect(server_name, tcp).await?;

        let (mut sender, connection) =
            hyper::client::conn::http1::handshake(TokioIo::new(tls)).await?;
        tokio::spawn(async move {
            let _ = connection.await;
        });

        let mut request = Request::builder()
            .method(method)
            .uri(path)
            .header(HOST, "localhost");
        if let Some(secret) = &self.secret {
            request = request.header(AUTHORIZATION, secret.as_str());
        }
        let request = request.body(Full::new(Bytes::from(body)))?;

        let response = sender.send_request(request).await?;
        let (parts, body) = response.into_parts();
        let body = body.collect().await.context("reading body")?.to_bytes();
        Ok(Reply {
            status: parts.status,
            headers: parts.headers,
            body,
        })
    }

    /// Framed RPC call.
    pub async fn call(&self, op: &str, control: Value, payload: &[u8]) -> Result<Reply> {
        self.send(Method::POST, "/", RequestFrame::encode(op, &control, payload))
            .await
    }
}
