//! Operation handlers.
//!
//! Each handler takes a validated request plus the payload and returns a
//! response frame. Engine calls are CPU-bound and run on the blocking pool.

pub mod decrypt;
pub mod encrypt;
pub mod keys;
pub mod unlock;
pub mod version;

use crate::cache::KeyCache;
use crate::domain::error::{ApiError, ApiResult};
use crate::domain::frame::ResponseFrame;
use crate::domain::requests::Request;
use crate::domain::results::CryptoFailed;
use crate::middleware::metrics::{Outcome, RpcMetrics};
use bytes::Bytes;
use cl_crypto::{CryptoEngine, CryptoError};
use std::sync::Arc;
use tracing::info;

/// Handler output: the frame plus how the call ended
#[derive(Debug)]
pub struct Handled {
    /// Response to send
    pub frame: ResponseFrame,
    /// `Success` or `CryptoFailure`
    pub outcome: Outcome,
}

impl Handled {
    pub(crate) fn success(frame: ResponseFrame) -> Self {
        Self {
            frame,
            outcome: Outcome::Success,
        }
    }

    pub(crate) fn failure(frame: ResponseFrame) -> Self {
        Self {
            frame,
            outcome: Outcome::CryptoFailure,
        }
    }
}

/// All operation handlers
pub struct RpcHandlers {
    engine: Arc<dyn CryptoEngine>,
    cache: Arc<KeyCache>,
    metrics: Arc<RpcMetrics>,
}

impl RpcHandlers {
    /// Create handlers over an engine and a key cache
    pub fn new(
        engine: Arc<dyn CryptoEngine>,
        cache: Arc<KeyCache>,
        metrics: Arc<RpcMetrics>,
    ) -> Self {
        Self {
            engine,
            cache,
            metrics,
        }
    }

    /// Key cache in use
    pub fn cache(&self) -> &Arc<KeyCache> {
        &self.cache
    }

    /// Run a validated request.
    pub async fn handle(&self, request: Request, payload: Bytes) -> ApiResult<Handled> {
        match request {
            Request::Version => version::version(self),
            Request::EncryptMsg(req) => encrypt::encrypt_msg(self, req, payload).await,
            Request::EncryptFile(req) => encrypt::encrypt_file(self, req, payload).await,
            Request::DecryptMsg(req) => decrypt::decrypt_msg(self, req, payload).await,
            Request::DecryptFile(req) => decrypt::decrypt_file(self, req, payload).await,
            Request::EncryptKey(req) => keys::encrypt_key(self, req).await,
            Request::DecryptKey(req) => keys::decrypt_key(self, req).await,
            Request::ParseKeys => keys::parse_keys(self, payload).await,
            Request::KeyCacheWipe => keys::key_cache_wipe(self),
        }
    }

    /// Run `f` with the engine on the blocking pool.
    pub(crate) async fn blocking<T, F>(&self, f: F) -> ApiResult<T>
    where
        F: FnOnce(&dyn CryptoEngine) -> T + Send + 'static,
        T: Send + 'static,
    {
        let engine = Arc::clone(&self.engine);
        tokio::task::spawn_blocking(move || f(engine.as_ref()))
            .await
            .map_err(|e| ApiError::internal(format!("engine task failed: {e}")))
    }
}

/// Map an engine error outside the decrypt path. Input the engine rejects
/// is a 200 failure; anything else is internal.
pub(crate) fn engine_failure(err: CryptoError) -> ApiResult<Handled> {
    match err {
        e if e.is_format() || is_input_error(&e) => {
            let failed = CryptoFailed::from_crypto(&e);
            info!(error_type = ?failed.error.error_type, "Engine rejected input");
            Ok(Handled::failure(ResponseFrame::json(&failed)?))
        }
        e => Err(ApiError::internal(e.to_string())),
    }
}

fn is_input_error(err: &CryptoError) -> bool {
    matches!(
        err,
        CryptoError::NotPrivateKey
            | CryptoError::KeyLocked
            | CryptoError::KeyNotProtected
            | CryptoError::NoRecipients
    )
}
