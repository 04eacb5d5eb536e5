//! # Crypto Engine
//!
//! The boundary the RPC layer consumes. Everything the service does with
//! keys and messages goes through [`CryptoEngine`], so tests can count or
//! replace engine calls.

use crate::keys::{Key, UnlockedKey, KEY_ALGORITHM, KEY_BITS};
use crate::message::{self, Decrypted, EncryptOptions, MessageInfo};
use crate::CryptoError;
use serde::Serialize;
use std::sync::Arc;

/// One identifier set of a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyIds {
    /// 40 hex chars
    pub fingerprint: String,
    /// 16 hex chars
    pub longid: String,
    /// 8 hex chars
    pub shortid: String,
}

/// Algorithm summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyAlgo {
    /// Algorithm name
    pub algorithm: String,
    /// Key size
    pub bits: u32,
}

/// Inspection result for one key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyDetails {
    /// Armored public half
    pub public: String,
    /// `None` for public keys
    pub is_decrypted: Option<bool>,
    /// User ids
    pub users: Vec<String>,
    /// Identifiers, primary first
    pub ids: Vec<KeyIds>,
    /// Algorithm summary
    pub algo: KeyAlgo,
    /// Seconds since the Unix epoch
    pub created: u64,
}

/// Cryptographic operations behind the RPC surface.
///
/// Implementations are called from blocking worker threads.
pub trait CryptoEngine: Send + Sync {
    /// Encrypt for the given recipients.
    fn encrypt(
        &self,
        recipients: &[Key],
        plaintext: &[u8],
        options: &EncryptOptions,
    ) -> Result<Vec<u8>, CryptoError>;

    /// Parse the first key in armored text.
    fn parse_key(&self, armored: &str) -> Result<Key, CryptoError>;

    /// Parse every key in armored text.
    fn read_keys(&self, armored: &str) -> Result<Vec<Key>, CryptoError>;

    /// Unlock a private key for decryption.
    fn unlock_key(&self, key: &Key, passphrase: Option<&str>) -> Result<UnlockedKey, CryptoError>;

    /// List a message's recipients without decrypting it.
    fn inspect_message(&self, data: &[u8]) -> Result<MessageInfo, CryptoError>;

    /// Decrypt a message with unlocked keys and/or a message password.
    fn decrypt(
        &self,
        keys: &[Arc<UnlockedKey>],
        data: &[u8],
        password: Option<&str>,
    ) -> Result<Decrypted, CryptoError>;

    /// Add passphrase protection to a decrypted private key.
    fn protect_key(&self, key: &Key, passphrase: &str) -> Result<Key, CryptoError>;

    /// Remove passphrase protection.
    fn unprotect_key(&self, key: &Key, passphrase: &str) -> Result<Key, CryptoError>;

    /// Describe a key.
    fn key_details(&self, key: &Key) -> Result<KeyDetails, CryptoError>;
}

/// The shipped engine: Ed25519/X25519 keys, XChaCha20-Poly1305 messages.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeEngine;

impl NativeEngine {
    /// Create the engine.
    pub fn new() -> Self {
        Self
    }
}

impl CryptoEngine for NativeEngine {
    fn encrypt(
        &self,
        recipients: &[Key],
        plaintext: &[u8],
        options: &EncryptOptions,
    ) -> Result<Vec<u8>, CryptoError> {
        message::encrypt(recipients, plaintext, options)
    }

    fn parse_key(&self, armored: &str) -> Result<Key, CryptoError> {
        Key::from_armored(armored)
    }

    fn read_keys(&self, armored: &str) -> Result<Vec<Key>, CryptoError> {
        Key::all_from_armored(armored)
    }

    fn unlock_key(&self, key: &Key, passphrase: Option<&str>) -> Result<UnlockedKey, CryptoError> {
        key.unlock(passphrase)
    }

    fn inspect_message(&self, data: &[u8]) -> Result<MessageInfo, CryptoError> {
        message::inspect(data)
    }

    fn decrypt(
        &self,
        keys: &[Arc<UnlockedKey>],
        data: &[u8],
        password: Option<&str>,
    ) -> Result<Decrypted, CryptoError> {
        let keys: Vec<&UnlockedKey> = keys.iter().map(Arc::as_ref).collect();
        message::decrypt(&keys, data, password)
    }

    fn protect_key(&self, key: &Key, passphrase: &str) -> Result<Key, CryptoError> {
        key.protect(passphrase)
    }

    fn unprotect_key(&self, key: &Key, passphrase: &str) -> Result<Key, CryptoError> {
        if key.is_decrypted() == Some(true) {
            return Err(CryptoError::KeyNotProtected);
        }
        key.unprotect(passphrase)
    }

    fn key_details(&self, key: &Key) -> Result<KeyDetails, CryptoError> {
        let fingerprint = key.fingerprint();
        Ok(KeyDetails {
            public: key.to_public().to_armored()?,
            is_decrypted: key.is_decrypted(),
            users: key.user_ids().to_vec(),
            ids: vec![KeyIds {
                fingerprint: fingerprint.to_hex(),
                longid: fingerprint.key_id().to_hex(),
                shortid: fingerprint.short_id(),
            }],
            algo: KeyAlgo {
                algorithm: KEY_ALGORITHM.to_string(),
                bits: KEY_BITS,
            },
            created: key.created(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_details_json_shape() {
        let engine = NativeEngine::new();
        let key = Key::generate(vec!["Test <t@est.com>".into()]);
        let details = engine.key_details(&key).unwrap();
        let json = serde_json::to_value(&details).unwrap();

        assert_eq!(json["isDecrypted"], true);
        assert_eq!(json["users"][0], "Test <t@est.com>");
        assert_eq!(json["ids"][0]["longid"], key.key_id().to_hex());
        assert_eq!(json["algo"]["bits"], 256);
        assert!(json["public"]
            .as_str()
            .unwrap()
            .starts_with("-----BEGIN CIPHERLINK PUBLIC KEY BLOCK-----"));

        let public = engine.key_details(&key.to_public()).unwrap();
        assert!(serde_json::to_value(&public).unwrap()["isDecrypted"].is_null());
    }

    #[test]
    fn test_unprotect_plain_key_rejected() {
        let engine = NativeEngine::new();
        let key = Key::generate(vec![]);
        assert!(matches!(
            engine.unprotect_key(&key, "pw"),
            Err(CryptoError::KeyNotProtected)
        ));
    }

    #[test]
    fn test_engine_roundtrip_through_arcs() {
        let engine = NativeEngine::new();
        let key = Key::generate(vec!["a <a@a>".into()]);
        let locked = engine.protect_key(&key, "pw").unwrap();
        let ct = engine
            .encrypt(&[key.to_public()], b"data", &EncryptOptions::default())
            .unwrap();

        let unlocked = Arc::new(engine.unlock_key(&locked, Some("pw")).unwrap());
        let out = engine.decrypt(&[unlocked], &ct, None).unwrap();
        assert_eq!(out.data, b"data");
    }
}
