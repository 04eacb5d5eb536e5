//! Crypto error types.

use thiserror::Error;

/// Errors raised by key, message and armor handling.
///
/// Messages never carry key material, passphrases or plaintext.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Text is not a recognizable armored block
    #[error("Armor error: {0}")]
    Armor(String),

    /// Armored or binary packet could not be decoded
    #[error("Format error: {0}")]
    Format(String),

    /// Key failed structural or self-certification checks
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// A public key was supplied where a private key is required
    #[error("Not a private key")]
    NotPrivateKey,

    /// Private key is still protected by a passphrase
    #[error("Private key is locked")]
    KeyLocked,

    /// Private key is already unprotected
    #[error("Private key is not protected")]
    KeyNotProtected,

    /// Passphrase did not unlock the key
    #[error("Wrong passphrase")]
    WrongPassphrase,

    /// Encryption requested without any recipient
    #[error("No recipients")]
    NoRecipients,

    /// None of the supplied keys is a recipient of the message
    #[error("No matching key")]
    NoMatchingKey,

    /// Message is password-protected and no password was supplied
    #[error("Message password required")]
    PasswordRequired,

    /// Message password did not decrypt the message
    #[error("Wrong message password")]
    WrongPassword,

    /// Encryption failed
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Decryption failed
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),
}

impl CryptoError {
    /// Format errors are caller mistakes (bad input) rather than engine faults.
    pub fn is_format(&self) -> bool {
        matches!(self, CryptoError::Armor(_) | CryptoError::Format(_) | CryptoError::InvalidKey(_))
    }
}

impl From<bincode::Error> for CryptoError {
    fn from(e: bincode::Error) -> Self {
        CryptoError::Format(e.to_string())
    }
}
