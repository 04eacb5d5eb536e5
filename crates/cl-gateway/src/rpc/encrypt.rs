//! `encryptMsg` and `encryptFile`.

use crate::domain::error::ApiResult;
use crate::domain::frame::ResponseFrame;
use crate::domain::requests::{EncryptFileRequest, EncryptMsgRequest};
use crate::domain::results::Empty;
use crate::rpc::{engine_failure, Handled, RpcHandlers};
use bytes::Bytes;
use cl_crypto::EncryptOptions;
use tracing::debug;

pub(crate) async fn encrypt_msg(
    handlers: &RpcHandlers,
    req: EncryptMsgRequest,
    payload: Bytes,
) -> ApiResult<Handled> {
    let options = EncryptOptions {
        armor: true,
        ..Default::default()
    };
    encrypt(handlers, req.pub_keys, payload, options).await
}

pub(crate) async fn encrypt_file(
    handlers: &RpcHandlers,
    req: EncryptFileRequest,
    payload: Bytes,
) -> ApiResult<Handled> {
    let options = EncryptOptions {
        filename: Some(req.name),
        armor: false,
        password: None,
    };
    encrypt(handlers, req.pub_keys, payload, options).await
}

async fn encrypt(
    handlers: &RpcHandlers,
    pub_keys: Vec<String>,
    payload: Bytes,
    options: EncryptOptions,
) -> ApiResult<Handled> {
    let recipients = pub_keys.len();
    let plaintext_len = payload.len();

    let encrypted = handlers
        .blocking(move |engine| {
            let keys = pub_keys
                .iter()
                .map(|armored| engine.parse_key(armored))
                .collect::<Result<Vec<_>, _>>()?;
            engine.encrypt(&keys, &payload, &options)
        })
        .await?;
    let ciphertext = match encrypted {
        Ok(ciphertext) => ciphertext,
        Err(e) => return engine_failure(e),
    };

    debug!(
        recipients,
        plaintext_len,
        ciphertext_len = ciphertext.len(),
        "Encrypted payload"
    );
    Ok(Handled::success(ResponseFrame::with_payload(
        &Empty {},
        ciphertext,
    )?))
}
