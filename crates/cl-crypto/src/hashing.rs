//! # Hashing
//!
//! BLAKE3 for fingerprints, armor checksums and key derivation; iterated and
//! salted SHA-256 (S2K) for turning passphrases into keys.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

/// Default number of bytes hashed by the S2K function.
pub const DEFAULT_S2K_COUNT: u32 = 1 << 20;

/// BLAKE3 hash output (256-bit).
pub type Hash = [u8; 32];

/// Hash multiple inputs (one-shot).
pub fn blake3_hash_many(inputs: &[&[u8]]) -> Hash {
    let mut hasher = blake3::Hasher::new();
    for input in inputs {
        hasher.update(input);
    }
    *hasher.finalize().as_bytes()
}

/// Derive key from context and input key material.
pub fn blake3_derive_key(context: &str, key_material: &[&[u8]]) -> Zeroizing<[u8; 32]> {
    let mut hasher = blake3::Hasher::new_derive_key(context);
    for part in key_material {
        hasher.update(part);
    }
    Zeroizing::new(*hasher.finalize().as_bytes())
}

/// Salted, iterated string-to-key parameters stored next to protected data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct S2kParams {
    /// Random salt
    pub salt: [u8; 16],
    /// Number of bytes fed through SHA-256
    pub count: u32,
}

impl S2kParams {
    /// Fresh parameters with a random salt.
    pub fn generate(count: u32) -> Self {
        let mut salt = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut salt);
        Self { salt, count }
    }

    /// Derive a 256-bit key from a passphrase.
    ///
    /// `salt || passphrase` is hashed repeatedly until `count` bytes have been
    /// consumed (at least one full copy is always hashed).
    pub fn derive(&self, passphrase: &str) -> Zeroizing<[u8; 32]> {
        let mut chunk = Zeroizing::new(Vec::with_capacity(16 + passphrase.len()));
        chunk.extend_from_slice(&self.salt);
        chunk.extend_from_slice(passphrase.as_bytes());

        let total = (self.count as usize).max(chunk.len());
        let mut hasher = Sha256::new();
        let mut fed = 0usize;
        while fed < total {
            let take = (total - fed).min(chunk.len());
            hasher.update(&chunk[..take]);
            fed += take;
        }

        let mut out = Zeroizing::new([0u8; 32]);
        out.copy_from_slice(&hasher.finalize());
        out
    }
}
