//! Cache-aware key parsing and unlocking.
//!
//! Unlocked keys are looked up by longid before anything is parsed; parsed
//! keys are looked up by their exact armored text. The engine is called only
//! on a miss, and every fresh unlock is written back.

use crate::domain::error::ApiResult;
use crate::domain::requests::PrvKeyInfo;
use crate::domain::results::LongIds;
use crate::rpc::RpcHandlers;
use cl_crypto::{CryptoError, Key, UnlockedKey};
use std::sync::Arc;
use tracing::debug;

/// Keys ready for decryption and the identifiers involved
#[derive(Debug, Default)]
pub(crate) struct UnlockedSet {
    pub keys: Vec<Arc<UnlockedKey>>,
    pub longids: LongIds,
}

/// Parse `armored`, going through the parsed-key cache.
pub(crate) async fn parsed_key(
    handlers: &RpcHandlers,
    armored: &str,
) -> ApiResult<Result<Arc<Key>, CryptoError>> {
    if let Some(key) = handlers.cache.get_parsed(armored) {
        return Ok(Ok(key));
    }
    let text = armored.to_string();
    let parsed = handlers
        .blocking(move |engine| engine.parse_key(&text))
        .await?;
    Ok(parsed.map(|key| {
        let key = Arc::new(key);
        handlers.cache.put_parsed(armored, Arc::clone(&key));
        key
    }))
}

/// Passphrase `index` first, then the others in order.
pub(crate) fn passphrase_order(index: usize, passphrases: &[String]) -> Vec<String> {
    let mut order = Vec::with_capacity(passphrases.len());
    if let Some(positional) = passphrases.get(index) {
        order.push(positional.clone());
    }
    order.extend(
        passphrases
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(_, p)| p.clone()),
    );
    order
}

/// Unlock every supplied key that is a recipient of the message.
///
/// Keys that are not recipients are never unlocked. A matching key that no
/// passphrase opens is reported in `need_passphrase`. Keys that cannot be
/// parsed or unlocked are skipped; the first such error is returned only
/// when no supplied key could be read at all.
pub(crate) async fn unlock_for_message(
    handlers: &RpcHandlers,
    keys: &[PrvKeyInfo],
    passphrases: &[String],
    recipients: &[String],
) -> ApiResult<Result<UnlockedSet, CryptoError>> {
    let mut set = UnlockedSet::default();
    let mut readable = 0usize;
    let mut first_error = None;

    for (index, info) in keys.iter().enumerate() {
        let longid = info.longid.trim().to_ascii_uppercase();
        if let Some(cached) = handlers.cache.get_unlocked(&longid) {
            if cached.key_id().to_hex() == longid {
                if recipients.contains(&longid) {
                    debug!(longid = %longid, "Using cached unlocked key");
                    set.longids.matching.push(longid.clone());
                    set.longids.chosen.push(longid);
                    set.keys.push(cached);
                }
                readable += 1;
                continue;
            }
        }

        let key = match parsed_key(handlers, &info.private).await? {
            Ok(key) => key,
            Err(e) => {
                debug!(index, error = %e, "Skipping unreadable key");
                first_error.get_or_insert(e);
                continue;
            }
        };
        readable += 1;
        let key_longid = key.key_id().to_hex();
        if !recipients.contains(&key_longid) {
            continue;
        }
        set.longids.matching.push(key_longid.clone());

        match unlock_key(handlers, key, passphrase_order(index, passphrases)).await? {
            Ok(Some(unlocked)) => {
                let unlocked = Arc::new(unlocked);
                handlers
                    .cache
                    .put_unlocked(key_longid.clone(), Arc::clone(&unlocked));
                debug!(longid = %key_longid, "Unlocked key");
                set.longids.chosen.push(key_longid);
                set.keys.push(unlocked);
            }
            Ok(None) => set.longids.need_passphrase.push(key_longid),
            Err(e) => {
                debug!(longid = %key_longid, error = %e, "Skipping unusable key");
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) if readable == 0 => Ok(Err(e)),
        _ => Ok(Ok(set)),
    }
}

/// Try passphrases in order. `Ok(None)` when none works.
async fn unlock_key(
    handlers: &RpcHandlers,
    key: Arc<Key>,
    passphrases: Vec<String>,
) -> ApiResult<Result<Option<UnlockedKey>, CryptoError>> {
    handlers
        .blocking(move |engine| {
            if key.is_decrypted() == Some(true) {
                return engine.unlock_key(&key, None).map(Some);
            }
            for passphrase in &passphrases {
                match engine.unlock_key(&key, Some(passphrase)) {
                    Ok(unlocked) => return Ok(Some(unlocked)),
                    Err(CryptoError::WrongPassphrase) => continue,
                    Err(e) => return Err(e),
                }
            }
            Ok(None)
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_passphrase_order_positional_first() {
        let passphrases = strings(&["a", "b", "c"]);
        assert_eq!(passphrase_order(1, &passphrases), strings(&["b", "a", "c"]));
        assert_eq!(passphrase_order(0, &passphrases), strings(&["a", "b", "c"]));
        assert_eq!(passphrase_order(5, &passphrases), strings(&["a", "b", "c"]));
        assert!(passphrase_order(0, &[]).is_empty());
    }
}
