//! Cipherlink service - loopback listener, mutual TLS and connection tasks.
//!
//! Startup order: validate config, load TLS material, bind, signal the host.
//! Nothing is bound when any of the first two fail.

use crate::cache::{ExpiryMode, KeyCache};
use crate::domain::config::{GatewayConfig, KeyCacheConfig, KeyCacheMode};
use crate::domain::error::GatewayError;
use crate::middleware::{MiddlewareStack, RpcMetrics};
use crate::ports::outbound::{listening_message, HostSignal};
use crate::router::{build_router, AppState};
use crate::rpc::RpcHandlers;
use crate::tls;
use axum::body::Body;
use axum::Router;
use cl_crypto::CryptoEngine;
use hyper::body::Incoming;
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;
use tower::ServiceExt;
use tracing::{debug, error, info, warn};

/// Key cache expiry for a config section.
pub fn expiry_mode(config: &KeyCacheConfig) -> ExpiryMode {
    match config.mode {
        KeyCacheMode::Sliding => ExpiryMode::Sliding(config.ttl),
        KeyCacheMode::FlushOnly => ExpiryMode::FlushOnly,
    }
}

/// Cipherlink service state
pub struct CipherlinkService {
    config: GatewayConfig,
    rpc_handlers: Arc<RpcHandlers>,
    cache: Arc<KeyCache>,
    metrics: Arc<RpcMetrics>,
    signal: Arc<dyn HostSignal>,
}

impl CipherlinkService {
    /// Create the service. Invalid configuration is fatal.
    pub fn new(
        config: GatewayConfig,
        engine: Arc<dyn CryptoEngine>,
        signal: Arc<dyn HostSignal>,
    ) -> Result<Self, GatewayError> {
        config.validate()?;

        let metrics = Arc::new(RpcMetrics::new());
        let cache = KeyCache::new(expiry_mode(&config.key_cache));
        let rpc_handlers = Arc::new(RpcHandlers::new(
            engine,
            Arc::clone(&cache),
            Arc::clone(&metrics),
        ));

        Ok(Self {
            config,
            rpc_handlers,
            cache,
            metrics,
            signal,
        })
    }

    /// Bind, signal readiness and start accepting connections.
    pub async fn start(&self) -> Result<ServiceHandle, GatewayError> {
        info!("Starting Cipherlink service...");

        let acceptor = tls::acceptor(&self.config.tls)?;

        let addr = self.config.listen_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| GatewayError::Bind(format!("{addr}: {e}")))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| GatewayError::Bind(e.to_string()))?;

        let router = self.build_router();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(accept_loop(listener, acceptor, router, shutdown_rx));

        info!(addr = %local_addr, "Listening");
        self.signal.send(&listening_message(local_addr.port()));

        Ok(ServiceHandle {
            local_addr,
            shutdown_tx: Some(shutdown_tx),
            task,
        })
    }

    /// Get metrics
    pub fn metrics(&self) -> Arc<RpcMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Key cache shared by all requests
    pub fn cache(&self) -> Arc<KeyCache> {
        Arc::clone(&self.cache)
    }

    fn build_router(&self) -> Router {
        let state = AppState {
            rpc_handlers: Arc::clone(&self.rpc_handlers),
            metrics: Arc::clone(&self.metrics),
        };
        build_router(
            state,
            MiddlewareStack::from_config(&self.config, Arc::clone(&self.metrics)),
        )
    }
}

/// A running listener.
pub struct ServiceHandle {
    local_addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ServiceHandle {
    /// Bound address (resolves port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections and wait for the accept loop to exit.
    /// Connections already being served run to completion.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.task).await {
            error!(error = %e, "Accept loop failed");
        }
        info!("Cipherlink service stopped");
    }
}

async fn accept_loop(
    listener: TcpListener,
    acceptor: TlsAcceptor,
    router: Router,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = &mut shutdown_rx => {
                info!("Received shutdown signal");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tokio::spawn(serve_connection(stream, peer, acceptor.clone(), router.clone()));
                }
                Err(e) => warn!(error = %e, "Accept failed"),
            }
        }
    }
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    acceptor: TlsAcceptor,
    router: Router,
) {
    let tls = match acceptor.accept(stream).await {
        Ok(tls) => tls,
        Err(e) => {
            warn!(peer = %peer, error = %e, "TLS handshake failed");
            return;
        }
    };
    debug!(peer = %peer, "Connection established");

    let service = hyper::service::service_fn(move |req: hyper::Request<Incoming>| {
        router.clone().oneshot(req.map(Body::new))
    });

    if let Err(e) = hyper::server::conn::http1::Builder::new()
        .serve_connection(TokioIo::new(tls), service)
        .await
    {
        debug!(peer = %peer, error = %e, "Connection closed with error");
    }
}
