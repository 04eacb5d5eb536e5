//! Result objects for crypto outcomes.
//!
//! Expected crypto failures travel as `{success:false, ...}` inside a 200
//! response; they are never mapped to [`ApiError`](crate::ApiError).

use crate::domain::blocks::BlockMeta;
use cl_crypto::{CryptoError, KeyDetails};
use serde::Serialize;

/// Decrypt failure classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecryptErrorType {
    /// None of the supplied keys can open the message
    KeyMismatch,
    /// A matching key is locked and no passphrase unlocked it
    NeedPassphrase,
    /// Message is password-protected; a message password is needed
    UsePassword,
    /// Message password was wrong
    WrongPassword,
    /// Input could not be parsed
    Format,
    /// Anything else
    Other,
}

/// Failure detail. Carries key identifiers only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecryptFailure {
    /// Classification
    #[serde(rename = "type")]
    pub error_type: DecryptErrorType,
    /// Human-readable reason
    pub message: String,
}

impl DecryptFailure {
    /// Build a failure.
    pub fn new(error_type: DecryptErrorType, message: impl Into<String>) -> Self {
        Self {
            error_type,
            message: message.into(),
        }
    }

    /// Classify an engine error.
    pub fn from_crypto(err: &CryptoError) -> Self {
        let error_type = match err {
            CryptoError::NoMatchingKey => DecryptErrorType::KeyMismatch,
            CryptoError::KeyLocked | CryptoError::WrongPassphrase => {
                DecryptErrorType::NeedPassphrase
            }
            CryptoError::PasswordRequired => DecryptErrorType::UsePassword,
            CryptoError::WrongPassword => DecryptErrorType::WrongPassword,
            e if e.is_format() => DecryptErrorType::Format,
            _ => DecryptErrorType::Other,
        };
        Self::new(error_type, err.to_string())
    }
}

/// Key identifiers involved in a decrypt attempt
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LongIds {
    /// Recipients listed in the message
    pub message: Vec<String>,
    /// Supplied keys that are recipients
    pub matching: Vec<String>,
    /// Keys that were unlocked and used
    pub chosen: Vec<String>,
    /// Matching keys no passphrase could unlock
    pub need_passphrase: Vec<String>,
}

/// Failed decrypt result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecryptFailed {
    /// Always false
    pub success: bool,
    /// Failure detail
    pub error_detail: DecryptFailure,
    /// Identifiers involved
    pub longids: LongIds,
    /// Whether the input parsed as an encrypted message
    pub is_encrypted: bool,
}

impl DecryptFailed {
    /// Failure result.
    pub fn new(error_detail: DecryptFailure, longids: LongIds, is_encrypted: bool) -> Self {
        Self {
            success: false,
            error_detail,
            longids,
            is_encrypted,
        }
    }
}

/// `decryptMsg` success
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecryptMsgSuccess {
    /// Always true
    pub success: bool,
    /// One meta per payload line
    pub block_metas: Vec<BlockMeta>,
}

/// `decryptFile` success
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecryptFileSuccess {
    /// Always true
    pub success: bool,
    /// File name stored in the message, empty if none
    pub name: String,
}

/// `encryptKey` result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptKeyResult {
    /// Armored protected key
    pub encrypted_key: String,
}

/// `decryptKey` result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DecryptKeyResult {
    /// Unprotected key
    #[serde(rename_all = "camelCase")]
    Decrypted {
        /// Always true
        success: bool,
        /// Armored unprotected key
        decrypted_key: String,
    },
    /// No passphrase worked
    Failed {
        /// Always false
        success: bool,
        /// Failure detail
        error: DecryptFailure,
    },
}

/// `parseKeys` result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ParseKeysResult {
    /// Parsed keys
    #[serde(rename_all = "camelCase")]
    Parsed {
        /// Input format
        format: &'static str,
        /// One entry per key
        key_details: Vec<KeyDetails>,
    },
    /// No readable key
    Failed {
        /// Always false
        success: bool,
        /// Failure detail
        error: DecryptFailure,
    },
}

/// Engine-reported failure for `encryptMsg`, `encryptFile` and `encryptKey`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CryptoFailed {
    /// Always false
    pub success: bool,
    /// Failure detail
    pub error: DecryptFailure,
}

impl CryptoFailed {
    /// Failure from an engine error
    pub fn from_crypto(err: &CryptoError) -> Self {
        Self {
            success: false,
            error: DecryptFailure::from_crypto(err),
        }
    }
}

/// Empty result object
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Empty {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_classification() {
        let cases = [
            (CryptoError::NoMatchingKey, DecryptErrorType::KeyMismatch),
            (CryptoError::KeyLocked, DecryptErrorType::NeedPassphrase),
            (CryptoError::PasswordRequired, DecryptErrorType::UsePassword),
            (CryptoError::WrongPassword, DecryptErrorType::WrongPassword),
            (CryptoError::Format("bad".into()), DecryptErrorType::Format),
            (CryptoError::DecryptionFailed("x".into()), DecryptErrorType::Other),
        ];
        for (err, expected) in cases {
            assert_eq!(DecryptFailure::from_crypto(&err).error_type, expected);
        }
    }

    #[test]
    fn test_failure_json_shape() {
        let failed = DecryptFailed::new(
            DecryptFailure::new(DecryptErrorType::NeedPassphrase, "Wrong passphrase"),
            LongIds {
                message: vec!["AAAA".into()],
                need_passphrase: vec!["AAAA".into()],
                ..Default::default()
            },
            false,
        );
        let value = serde_json::to_value(&failed).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["errorDetail"]["type"], "need_passphrase");
        assert_eq!(value["longids"]["needPassphrase"][0], "AAAA");
        assert_eq!(value["isEncrypted"], false);
    }

    #[test]
    fn test_decrypt_key_result_shapes() {
        let ok = DecryptKeyResult::Decrypted {
            success: true,
            decrypted_key: "k".into(),
        };
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({"success": true, "decryptedKey": "k"})
        );
        assert_eq!(serde_json::to_value(Empty {}).unwrap(), json!({}));
    }
}
