//! `decryptMsg` and `decryptFile`.
//!
//! Expected failures (no matching key, wrong passphrase, wrong password,
//! unreadable message) are 200 responses with `success:false` and an empty
//! payload. They never carry key text or plaintext.

use crate::domain::blocks::{encode_blocks, fmt_decrypted};
use crate::domain::error::ApiResult;
use crate::domain::frame::ResponseFrame;
use crate::domain::requests::DecryptRequest;
use crate::domain::results::{
    DecryptErrorType, DecryptFailed, DecryptFailure, DecryptFileSuccess, DecryptMsgSuccess,
    LongIds,
};
use crate::rpc::unlock::unlock_for_message;
use crate::rpc::{Handled, RpcHandlers};
use bytes::Bytes;
use cl_crypto::{CryptoError, Decrypted, KeyId};
use tracing::{debug, info};

enum DecryptOutcome {
    Decrypted(Decrypted),
    Failed(DecryptFailed),
}

pub(crate) async fn decrypt_msg(
    handlers: &RpcHandlers,
    req: DecryptRequest,
    payload: Bytes,
) -> ApiResult<Handled> {
    match decrypt(handlers, req, payload).await? {
        DecryptOutcome::Decrypted(decrypted) => {
            let blocks = fmt_decrypted(&decrypted.data);
            let block_metas = blocks.iter().map(|b| b.meta()).collect();
            let payload = encode_blocks(&blocks)?;
            debug!(blocks = blocks.len(), "Decrypted message");
            let result = DecryptMsgSuccess {
                success: true,
                block_metas,
            };
            Ok(Handled::success(ResponseFrame::with_payload(&result, payload)?))
        }
        DecryptOutcome::Failed(failed) => Ok(Handled::failure(ResponseFrame::json(&failed)?)),
    }
}

pub(crate) async fn decrypt_file(
    handlers: &RpcHandlers,
    req: DecryptRequest,
    payload: Bytes,
) -> ApiResult<Handled> {
    match decrypt(handlers, req, payload).await? {
        DecryptOutcome::Decrypted(decrypted) => {
            let result = DecryptFileSuccess {
                success: true,
                name: decrypted.filename.unwrap_or_default(),
            };
            debug!(size = decrypted.data.len(), "Decrypted file");
            Ok(Handled::success(ResponseFrame::with_payload(
                &result,
                decrypted.data,
            )?))
        }
        DecryptOutcome::Failed(failed) => Ok(Handled::failure(ResponseFrame::json(&failed)?)),
    }
}

async fn decrypt(
    handlers: &RpcHandlers,
    req: DecryptRequest,
    data: Bytes,
) -> ApiResult<DecryptOutcome> {
    let message = data.clone();
    let info = match handlers
        .blocking(move |engine| engine.inspect_message(&message))
        .await?
    {
        Ok(info) => info,
        Err(e) => {
            return Ok(failed(&e, LongIds::default(), false));
        }
    };
    let recipients: Vec<String> = info.recipients.iter().map(KeyId::to_hex).collect();

    let unlocked =
        match unlock_for_message(handlers, &req.keys, &req.passphrases, &recipients).await? {
            Ok(set) => set,
            Err(e) => {
                let longids = LongIds {
                    message: recipients,
                    ..Default::default()
                };
                return Ok(failed(&e, longids, true));
            }
        };
    let mut longids = unlocked.longids;
    longids.message = recipients;

    let keys = unlocked.keys;
    let password = req.msg_pwd;
    let result = handlers
        .blocking(move |engine| engine.decrypt(&keys, &data, password.as_deref()))
        .await?;

    match result {
        Ok(decrypted) => Ok(DecryptOutcome::Decrypted(decrypted)),
        Err(e) => {
            let locked_out = longids.chosen.is_empty()
                && !longids.need_passphrase.is_empty()
                && matches!(e, CryptoError::NoMatchingKey | CryptoError::PasswordRequired);
            let failure = if locked_out {
                DecryptFailure::new(DecryptErrorType::NeedPassphrase, "Missing or wrong passphrase")
            } else {
                DecryptFailure::from_crypto(&e)
            };
            info!(
                error_type = ?failure.error_type,
                matching = longids.matching.len(),
                "Decrypt failed"
            );
            Ok(DecryptOutcome::Failed(DecryptFailed::new(failure, longids, true)))
        }
    }
}

fn failed(err: &CryptoError, longids: LongIds, is_encrypted: bool) -> DecryptOutcome {
    let failure = DecryptFailure::from_crypto(err);
    info!(error_type = ?failure.error_type, "Decrypt failed");
    DecryptOutcome::Failed(DecryptFailed::new(failure, longids, is_encrypted))
}
