//! Typed requests and their validation.
//!
//! Validation is pure: it only inspects the control object. A failure names
//! the operation and never echoes field values.

use crate::domain::error::{ApiError, ApiResult};
use crate::domain::operations::Operation;
use serde_json::{Map, Value};
use std::fmt;

/// Private key reference in a decrypt request
#[derive(Clone, PartialEq, Eq)]
pub struct PrvKeyInfo {
    /// Armored private key
    pub private: String,
    /// Key identifier the caller associates with it
    pub longid: String,
}

impl fmt::Debug for PrvKeyInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrvKeyInfo")
            .field("longid", &self.longid)
            .finish_non_exhaustive()
    }
}

/// `encryptMsg`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptMsgRequest {
    /// Armored recipient keys
    pub pub_keys: Vec<String>,
}

/// `encryptFile`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptFileRequest {
    /// Armored recipient keys
    pub pub_keys: Vec<String>,
    /// File name stored in the message
    pub name: String,
}

/// `decryptMsg` and `decryptFile`
#[derive(Clone, PartialEq, Eq)]
pub struct DecryptRequest {
    /// Candidate private keys
    pub keys: Vec<PrvKeyInfo>,
    /// Passphrases, positionally matched to `keys` first
    pub passphrases: Vec<String>,
    /// Message password
    pub msg_pwd: Option<String>,
    /// Accepted for compatibility; no MIME parsing is done
    pub is_email: bool,
}

impl fmt::Debug for DecryptRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptRequest")
            .field("keys", &self.keys)
            .field("passphrases", &self.passphrases.len())
            .field("msg_pwd", &self.msg_pwd.is_some())
            .field("is_email", &self.is_email)
            .finish()
    }
}

/// `encryptKey`
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptKeyRequest {
    /// Armored decrypted private key
    pub armored: String,
    /// New passphrase
    pub passphrase: String,
}

/// `decryptKey`
#[derive(Clone, PartialEq, Eq)]
pub struct DecryptKeyRequest {
    /// Armored protected private key
    pub armored: String,
    /// Passphrases to try in order
    pub passphrases: Vec<String>,
}

/// A validated request
#[derive(Clone)]
pub enum Request {
    /// `version`
    Version,
    /// `encryptMsg`
    EncryptMsg(EncryptMsgRequest),
    /// `encryptFile`
    EncryptFile(EncryptFileRequest),
    /// `decryptMsg`
    DecryptMsg(DecryptRequest),
    /// `decryptFile`
    DecryptFile(DecryptRequest),
    /// `encryptKey`
    EncryptKey(EncryptKeyRequest),
    /// `decryptKey`
    DecryptKey(DecryptKeyRequest),
    /// `parseKeys`
    ParseKeys,
    /// `keyCacheWipe`
    KeyCacheWipe,
}

/// Check the control object of `operation` and build its typed request.
pub fn validate(operation: Operation, control: &Map<String, Value>) -> ApiResult<Request> {
    let wrong = || ApiError::wrong_structure(operation.as_str());
    let request = match operation {
        Operation::Version => Request::Version,
        Operation::ParseKeys => Request::ParseKeys,
        Operation::KeyCacheWipe => Request::KeyCacheWipe,
        Operation::EncryptMsg => Request::EncryptMsg(EncryptMsgRequest {
            pub_keys: recipient_keys(control).ok_or_else(wrong)?,
        }),
        Operation::EncryptFile => Request::EncryptFile(EncryptFileRequest {
            pub_keys: recipient_keys(control).ok_or_else(wrong)?,
            name: string(control, "name").ok_or_else(wrong)?,
        }),
        Operation::DecryptMsg => Request::DecryptMsg(decrypt_request(control).ok_or_else(wrong)?),
        Operation::DecryptFile => {
            Request::DecryptFile(decrypt_request(control).ok_or_else(wrong)?)
        }
        Operation::EncryptKey => {
            let armored = string(control, "armored").ok_or_else(wrong)?;
            let passphrase = string(control, "passphrase")
                .filter(|p| !p.is_empty())
                .ok_or_else(wrong)?;
            Request::EncryptKey(EncryptKeyRequest {
                armored,
                passphrase,
            })
        }
        Operation::DecryptKey => Request::DecryptKey(DecryptKeyRequest {
            armored: string(control, "armored").ok_or_else(wrong)?,
            passphrases: string_array(control, "passphrases").ok_or_else(wrong)?,
        }),
    };
    Ok(request)
}

fn string(control: &Map<String, Value>, field: &str) -> Option<String> {
    control.get(field)?.as_str().map(str::to_string)
}

fn string_array(control: &Map<String, Value>, field: &str) -> Option<Vec<String>> {
    control
        .get(field)?
        .as_array()?
        .iter()
        .map(|v| v.as_str().map(str::to_string))
        .collect()
}

fn recipient_keys(control: &Map<String, Value>) -> Option<Vec<String>> {
    string_array(control, "pubKeys").filter(|keys| !keys.is_empty() && keys.iter().all(|k| !k.is_empty()))
}

fn decrypt_request(control: &Map<String, Value>) -> Option<DecryptRequest> {
    let keys = control
        .get("keys")?
        .as_array()?
        .iter()
        .map(|entry| {
            let entry = entry.as_object()?;
            Some(PrvKeyInfo {
                private: string(entry, "private")?,
                longid: string(entry, "longid")?,
            })
        })
        .collect::<Option<Vec<_>>>()?;
    let passphrases = string_array(control, "passphrases")?;
    let msg_pwd = match control.get("msgPwd") {
        None | Some(Value::Null) => None,
        Some(Value::String(pwd)) => Some(pwd.clone()),
        Some(_) => return None,
    };
    let is_email = match control.get("isEmail") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => *flag,
        Some(_) => return None,
    };
    Some(DecryptRequest {
        keys,
        passphrases,
        msg_pwd,
        is_email,
    })
}
