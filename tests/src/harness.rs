//! Starts a real service on an ephemeral loopback port.

use crate::client::TestClient;
use crate::pki::{Identity, TestPki};
use anyhow::Result;
use cl_crypto::NativeEngine;
use cl_gateway::{CipherlinkService, ChannelSignal, GatewayConfig, ServiceHandle};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

/// Shared secret every suite client sends.
pub const SECRET: &str = "Basic Y2lwaGVybGluazp0ZXN0";

/// A running service and everything needed to talk to it.
pub struct Running {
    pub pki: TestPki,
    pub service: CipherlinkService,
    pub handle: ServiceHandle,
    /// Host signals emitted so far
    pub signals: UnboundedReceiver<String>,
}

/// Start with defaults adjusted by `configure`.
pub async fn start_with<F>(configure: F) -> Result<Running>
where
    F: FnOnce(&mut GatewayConfig),
{
    let pki = TestPki::generate()?;
    let mut config = GatewayConfig::default();
    config.tls = pki.tls_config();
    config.auth.header = Some(SECRET.to_string());
    configure(&mut config);

    let (signal, signals) = ChannelSignal::new();
    let service = CipherlinkService::new(config, Arc::new(NativeEngine::new()), Arc::new(signal))?;
    let handle = service.start().await?;

    Ok(Running {
        pki,
        service,
        handle,
        signals,
    })
}

/// Start with defaults.
pub async fn start() -> Result<Running> {
    start_with(|_| {}).await
}

impl Running {
    /// Trusted client sending the right secret.
    pub fn client(&self) -> Result<TestClient> {
        self.client_with(Some(&self.pki.client), Some(SECRET))
    }

    /// Client with a chosen certificate and secret.
    pub fn client_with(&self, identity: Option<&Identity>, secret: Option<&str>) -> Result<TestClient> {
        TestClient::new(&self.pki, identity, self.handle.local_addr(), secret)
    }
}
