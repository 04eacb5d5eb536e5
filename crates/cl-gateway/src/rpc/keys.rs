//! `encryptKey`, `decryptKey`, `parseKeys` and `keyCacheWipe`.

use crate::domain::error::{ApiError, ApiResult};
use crate::domain::frame::ResponseFrame;
use crate::domain::requests::{DecryptKeyRequest, EncryptKeyRequest};
use crate::domain::results::{
    DecryptErrorType, DecryptFailure, DecryptKeyResult, Empty, EncryptKeyResult, ParseKeysResult,
};
use crate::rpc::unlock::parsed_key;
use crate::rpc::{engine_failure, Handled, RpcHandlers};
use bytes::Bytes;
use cl_crypto::CryptoError;
use tracing::{debug, info};

pub(crate) async fn encrypt_key(
    handlers: &RpcHandlers,
    req: EncryptKeyRequest,
) -> ApiResult<Handled> {
    let key = match parsed_key(handlers, &req.armored).await? {
        Ok(key) => key,
        Err(e) => return engine_failure(e),
    };
    let passphrase = req.passphrase;
    let protected = handlers
        .blocking(move |engine| engine.protect_key(&key, &passphrase)?.to_armored())
        .await?;
    let encrypted_key = match protected {
        Ok(encrypted_key) => encrypted_key,
        Err(e) => return engine_failure(e),
    };
    Ok(Handled::success(ResponseFrame::json(&EncryptKeyResult {
        encrypted_key,
    })?))
}

pub(crate) async fn decrypt_key(
    handlers: &RpcHandlers,
    req: DecryptKeyRequest,
) -> ApiResult<Handled> {
    let key = match parsed_key(handlers, &req.armored).await? {
        Ok(key) => key,
        Err(e) => return failed_key(DecryptFailure::from_crypto(&e)),
    };

    let passphrases = req.passphrases;
    let unprotected = handlers
        .blocking(move |engine| {
            for passphrase in &passphrases {
                match engine.unprotect_key(&key, passphrase) {
                    Ok(key) => return key.to_armored().map(Some),
                    Err(CryptoError::WrongPassphrase) => continue,
                    Err(e) => return Err(e),
                }
            }
            Ok(None)
        })
        .await?;

    match unprotected {
        Ok(Some(decrypted_key)) => Ok(Handled::success(ResponseFrame::json(
            &DecryptKeyResult::Decrypted {
                success: true,
                decrypted_key,
            },
        )?)),
        Ok(None) => failed_key(DecryptFailure::new(
            DecryptErrorType::NeedPassphrase,
            "Wrong passphrase",
        )),
        Err(e) => failed_key(DecryptFailure::from_crypto(&e)),
    }
}

fn failed_key(error: DecryptFailure) -> ApiResult<Handled> {
    info!(error_type = ?error.error_type, "Key decrypt failed");
    Ok(Handled::failure(ResponseFrame::json(
        &DecryptKeyResult::Failed {
            success: false,
            error,
        },
    )?))
}

pub(crate) async fn parse_keys(handlers: &RpcHandlers, payload: Bytes) -> ApiResult<Handled> {
    let parsed = handlers
        .blocking(move |engine| {
            let text = std::str::from_utf8(&payload)
                .map_err(|_| CryptoError::Armor("key text is not UTF-8".into()))?;
            let keys = engine.read_keys(text)?;
            if keys.is_empty() {
                return Err(CryptoError::Armor("no key found".into()));
            }
            keys.iter().map(|key| engine.key_details(key)).collect::<Result<Vec<_>, _>>()
        })
        .await?;

    match parsed {
        Ok(key_details) => {
            debug!(keys = key_details.len(), "Parsed keys");
            Ok(Handled::success(ResponseFrame::json(&ParseKeysResult::Parsed {
                format: "armored",
                key_details,
            })?))
        }
        Err(e) if e.is_format() => Ok(Handled::failure(ResponseFrame::json(
            &ParseKeysResult::Failed {
                success: false,
                error: DecryptFailure::new(DecryptErrorType::Format, e.to_string()),
            },
        )?)),
        Err(e) => Err(ApiError::internal(e.to_string())),
    }
}

pub(crate) fn key_cache_wipe(handlers: &RpcHandlers) -> ApiResult<Handled> {
    handlers.cache.flush();
    Ok(Handled::success(ResponseFrame::json(&Empty {})?))
}
