//! Operation registry.
//!
//! The set of operations is closed: every wire name maps to one
//! [`Operation`] variant, and the table is built once on first use.
//! Unknown names are rejected before any handler is looked up.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

/// Every operation the service answers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Runtime information
    Version,
    /// Encrypt text to an armored message
    EncryptMsg,
    /// Encrypt bytes to a binary message
    EncryptFile,
    /// Decrypt to display blocks
    DecryptMsg,
    /// Decrypt to raw bytes
    DecryptFile,
    /// Protect a private key with a passphrase
    EncryptKey,
    /// Remove passphrase protection
    DecryptKey,
    /// Describe armored keys
    ParseKeys,
    /// Flush the key cache
    KeyCacheWipe,
}

impl Operation {
    /// Wire name of the operation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Operation::Version => "version",
            Operation::EncryptMsg => "encryptMsg",
            Operation::EncryptFile => "encryptFile",
            Operation::DecryptMsg => "decryptMsg",
            Operation::DecryptFile => "decryptFile",
            Operation::EncryptKey => "encryptKey",
            Operation::DecryptKey => "decryptKey",
            Operation::ParseKeys => "parseKeys",
            Operation::KeyCacheWipe => "keyCacheWipe",
        }
    }

    /// Resolve a wire name through the registry.
    pub fn from_wire(name: &str) -> Option<Self> {
        OPERATION_REGISTRY.get(name).map(|info| info.operation)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operation metadata
#[derive(Debug, Clone)]
pub struct OperationInfo {
    /// Wire name
    pub name: &'static str,
    /// Variant
    pub operation: Operation,
    /// Handler unlocks private keys (and consults the key cache)
    pub uses_private_keys: bool,
    /// Brief description
    pub description: &'static str,
}

impl OperationInfo {
    const fn public(operation: Operation, description: &'static str) -> Self {
        Self {
            name: operation.as_str(),
            operation,
            uses_private_keys: false,
            description,
        }
    }

    const fn private(operation: Operation, description: &'static str) -> Self {
        Self {
            name: operation.as_str(),
            operation,
            uses_private_keys: true,
            description,
        }
    }
}

/// Operation registry
pub static OPERATION_REGISTRY: LazyLock<HashMap<&'static str, OperationInfo>> =
    LazyLock::new(|| {
        let operations = [
            OperationInfo::public(Operation::Version, "Returns runtime version information"),
            OperationInfo::public(
                Operation::EncryptMsg,
                "Encrypts the payload to an armored message",
            ),
            OperationInfo::public(
                Operation::EncryptFile,
                "Encrypts the payload to a binary message carrying a file name",
            ),
            OperationInfo::private(
                Operation::DecryptMsg,
                "Decrypts a message into display blocks",
            ),
            OperationInfo::private(Operation::DecryptFile, "Decrypts a message into raw bytes"),
            OperationInfo::public(
                Operation::EncryptKey,
                "Protects a private key with a passphrase",
            ),
            OperationInfo::private(
                Operation::DecryptKey,
                "Removes passphrase protection from a private key",
            ),
            OperationInfo::public(Operation::ParseKeys, "Describes armored keys"),
            OperationInfo::public(Operation::KeyCacheWipe, "Clears the unlocked key cache"),
        ];
        operations.into_iter().map(|op| (op.name, op)).collect()
    });

/// Get operation info
pub fn get_operation_info(name: &str) -> Option<&'static OperationInfo> {
    OPERATION_REGISTRY.get(name)
}

/// All registered wire names, sorted
pub fn operation_names() -> Vec<&'static str> {
    let mut names: Vec<_> = OPERATION_REGISTRY.keys().copied().collect();
    names.sort_unstable();
    names
}
