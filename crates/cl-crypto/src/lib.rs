//! # Cipherlink Crypto
//!
//! Key, message and armor primitives behind the Cipherlink RPC service.
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `symmetric` | XChaCha20-Poly1305 | Message bodies, wrapped keys |
//! | `hashing` | BLAKE3, iterated SHA-256 | Fingerprints, KDF, passphrase S2K |
//! | `keys` | Ed25519 + X25519 | Certified keys with optional passphrase protection |
//! | `message` | X25519 agreement | Multi-recipient and password messages |
//! | `armor` | Base64 | Text-safe key and message blocks |
//! | `engine` | - | `CryptoEngine` boundary and the native implementation |

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod armor;
pub mod engine;
pub mod errors;
pub mod hashing;
pub mod keys;
pub mod message;
pub mod symmetric;

// Re-exports
pub use armor::{find_blocks, ArmorKind, ArmoredSpan};
pub use engine::{CryptoEngine, KeyAlgo, KeyDetails, KeyIds, NativeEngine};
pub use errors::CryptoError;
pub use keys::{Fingerprint, Key, KeyId, UnlockedKey};
pub use message::{Decrypted, EncryptOptions, MessageInfo};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
