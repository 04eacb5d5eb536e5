//! # Keys
//!
//! A key is an Ed25519 primary (certifies the key) plus an X25519 encryption
//! subkey. The secret half is either absent (public key), stored plainly, or
//! sealed under a passphrase-derived key.
//!
//! Identifiers follow the usual scheme: a 20-byte fingerprint, the last
//! 8 bytes as the long id and the last 4 as the short id, all upper-case hex.

use crate::armor::{self, ArmorKind};
use crate::hashing::{blake3_derive_key, blake3_hash_many, S2kParams, DEFAULT_S2K_COUNT};
use crate::symmetric::{generate_nonce, open, seal};
use crate::CryptoError;
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use x25519_dalek::{PublicKey as X25519Public, StaticSecret};
use zeroize::{Zeroize, Zeroizing};

const KEY_PACKET_VERSION: u8 = 1;
const FINGERPRINT_DOMAIN: &[u8] = b"cipherlink fingerprint v1";
const CERTIFICATION_DOMAIN: &[u8] = b"cipherlink certification v1";
const SECRET_KEK_CONTEXT: &str = "cipherlink secret key protection v1";

/// Algorithm name reported by key inspection.
pub const KEY_ALGORITHM: &str = "ed25519_x25519";
/// Nominal key size in bits.
pub const KEY_BITS: u32 = 256;

/// 20-byte key fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 20]);

impl Fingerprint {
    /// Upper-case hex form.
    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.0)
    }

    /// Long id: last 8 bytes.
    pub fn key_id(&self) -> KeyId {
        let mut id = [0u8; 8];
        id.copy_from_slice(&self.0[12..]);
        KeyId(id)
    }

    /// Short id: last 4 bytes, upper-case hex.
    pub fn short_id(&self) -> String {
        hex::encode_upper(&self.0[16..])
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// 8-byte key id. Its hex form is the `longid` used throughout the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyId(pub [u8; 8]);

impl KeyId {
    /// Upper-case hex form.
    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.0)
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[derive(Clone, Serialize, Deserialize)]
struct KeyPacket {
    version: u8,
    created: u64,
    user_ids: Vec<String>,
    primary_public: [u8; 32],
    subkey_public: [u8; 32],
    certification: Vec<u8>,
    secret: Option<SecretSection>,
}

#[derive(Clone, Serialize, Deserialize)]
enum SecretSection {
    Plain(SecretMaterial),
    Protected {
        s2k: S2kParams,
        nonce: [u8; 24],
        ciphertext: Vec<u8>,
    },
}

#[derive(Clone, Serialize, Deserialize, Zeroize)]
#[zeroize(drop)]
struct SecretMaterial {
    primary: [u8; 32],
    subkey: [u8; 32],
}

impl KeyPacket {
    fn certified_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(128);
        out.extend_from_slice(CERTIFICATION_DOMAIN);
        out.push(self.version);
        out.extend_from_slice(&self.created.to_be_bytes());
        for uid in &self.user_ids {
            out.extend_from_slice(&(uid.len() as u32).to_be_bytes());
            out.extend_from_slice(uid.as_bytes());
        }
        out.extend_from_slice(&self.primary_public);
        out.extend_from_slice(&self.subkey_public);
        out
    }

    fn fingerprint(&self) -> Fingerprint {
        let digest = blake3_hash_many(&[
            FINGERPRINT_DOMAIN,
            &self.created.to_be_bytes(),
            &self.primary_public,
        ]);
        let mut fp = [0u8; 20];
        fp.copy_from_slice(&digest[..20]);
        Fingerprint(fp)
    }

    fn verify_certification(&self) -> Result<(), CryptoError> {
        if self.version != KEY_PACKET_VERSION {
            return Err(CryptoError::InvalidKey(format!(
                "unsupported key version {}",
                self.version
            )));
        }
        let verifying = VerifyingKey::from_bytes(&self.primary_public)
            .map_err(|_| CryptoError::InvalidKey("bad primary key".into()))?;
        let sig_bytes: [u8; 64] = self
            .certification
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::InvalidKey("bad certification length".into()))?;
        let signature = ed25519_dalek::Signature::from_bytes(&sig_bytes);
        verifying
            .verify(&self.certified_bytes(), &signature)
            .map_err(|_| CryptoError::InvalidKey("certification does not verify".into()))
    }
}

/// Secret-section key for a passphrase.
fn secret_kek(s2k: &S2kParams, passphrase: &str, primary_public: &[u8; 32]) -> Zeroizing<[u8; 32]> {
    let stretched = s2k.derive(passphrase);
    blake3_derive_key(SECRET_KEK_CONTEXT, &[stretched.as_slice(), primary_public])
}

/// A parsed public or private key.
///
/// Private keys may be locked (passphrase-protected) or decrypted.
#[derive(Clone)]
pub struct Key {
    packet: KeyPacket,
    fingerprint: Fingerprint,
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Key")
            .field("fingerprint", &self.fingerprint)
            .field("private", &self.is_private())
            .finish()
    }
}

impl Key {
    /// Generate a new, unprotected private key.
    pub fn generate(user_ids: Vec<String>) -> Self {
        let mut rng = rand::thread_rng();
        let signing = SigningKey::generate(&mut rng);
        let subkey = StaticSecret::random_from_rng(&mut rng);
        let created = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        let mut packet = KeyPacket {
            version: KEY_PACKET_VERSION,
            created,
            user_ids,
            primary_public: signing.verifying_key().to_bytes(),
            subkey_public: X25519Public::from(&subkey).to_bytes(),
            certification: Vec::new(),
            secret: Some(SecretSection::Plain(SecretMaterial {
                primary: signing.to_bytes(),
                subkey: subkey.to_bytes(),
            })),
        };
        packet.certification = signing.sign(&packet.certified_bytes()).to_bytes().to_vec();

        let fingerprint = packet.fingerprint();
        Self {
            packet,
            fingerprint,
        }
    }

    /// Decode a binary key packet and check its certification.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let packet: KeyPacket = bincode::deserialize(bytes)?;
        packet.verify_certification()?;
        let fingerprint = packet.fingerprint();
        Ok(Self {
            packet,
            fingerprint,
        })
    }

    /// Decode the first armored key in `text`.
    pub fn from_armored(text: &str) -> Result<Self, CryptoError> {
        let (kind, data) = armor::dearmor(text)?;
        Self::from_armored_block(kind, &data)
    }

    /// Decode every armored key in `text`. Non-key blocks are skipped.
    pub fn all_from_armored(text: &str) -> Result<Vec<Self>, CryptoError> {
        armor::dearmor_all(text)?
            .into_iter()
            .filter(|(kind, _)| *kind != ArmorKind::Message)
            .map(|(kind, data)| Self::from_armored_block(kind, &data))
            .collect()
    }

    fn from_armored_block(kind: ArmorKind, data: &[u8]) -> Result<Self, CryptoError> {
        let key = Self::from_bytes(data)?;
        match (kind, key.is_private()) {
            (ArmorKind::PublicKey, false) | (ArmorKind::PrivateKey, true) => Ok(key),
            (ArmorKind::Message, _) => Err(CryptoError::Format("armored block is a message".into())),
            _ => Err(CryptoError::Format("armor type does not match key".into())),
        }
    }

    /// Binary encoding.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        bincode::serialize(&self.packet).map_err(CryptoError::from)
    }

    /// Armored encoding (public or private block as appropriate).
    pub fn to_armored(&self) -> Result<String, CryptoError> {
        let kind = if self.is_private() {
            ArmorKind::PrivateKey
        } else {
            ArmorKind::PublicKey
        };
        Ok(armor::armor(kind, &self.to_bytes()?))
    }

    /// Public half of this key.
    pub fn to_public(&self) -> Self {
        let mut packet = self.packet.clone();
        packet.secret = None;
        Self {
            packet,
            fingerprint: self.fingerprint,
        }
    }

    /// Whether the key carries a secret section.
    pub fn is_private(&self) -> bool {
        self.packet.secret.is_some()
    }

    /// `None` for public keys, otherwise whether the secret is unprotected.
    pub fn is_decrypted(&self) -> Option<bool> {
        self.packet
            .secret
            .as_ref()
            .map(|s| matches!(s, SecretSection::Plain(_)))
    }

    /// User ids bound by the certification.
    pub fn user_ids(&self) -> &[String] {
        &self.packet.user_ids
    }

    /// Creation time, seconds since the Unix epoch.
    pub fn created(&self) -> u64 {
        self.packet.created
    }

    /// Primary key fingerprint.
    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    /// Long id.
    pub fn key_id(&self) -> KeyId {
        self.fingerprint.key_id()
    }

    /// Public half of the encryption subkey.
    pub fn encryption_key(&self) -> [u8; 32] {
        self.packet.subkey_public
    }

    /// Seal the secret section under `passphrase`.
    pub fn protect(&self, passphrase: &str) -> Result<Self, CryptoError> {
        let material = match &self.packet.secret {
            None => return Err(CryptoError::NotPrivateKey),
            Some(SecretSection::Protected { .. }) => return Err(CryptoError::KeyLocked),
            Some(SecretSection::Plain(m)) => m,
        };

        let plaintext = Zeroizing::new(bincode::serialize(material)?);
        let s2k = S2kParams::generate(DEFAULT_S2K_COUNT);
        let nonce = generate_nonce();
        let kek = secret_kek(&s2k, passphrase, &self.packet.primary_public);
        let ciphertext = seal(&kek, &nonce, &plaintext)?;

        let mut packet = self.packet.clone();
        packet.secret = Some(SecretSection::Protected {
            s2k,
            nonce,
            ciphertext,
        });
        Ok(Self {
            packet,
            fingerprint: self.fingerprint,
        })
    }

    /// Remove passphrase protection, returning a decrypted private key.
    pub fn unprotect(&self, passphrase: &str) -> Result<Self, CryptoError> {
        let material = self.open_secret(Some(passphrase))?;
        let mut packet = self.packet.clone();
        packet.secret = Some(SecretSection::Plain(material));
        Ok(Self {
            packet,
            fingerprint: self.fingerprint,
        })
    }

    /// Produce usable secret material. A decrypted key needs no passphrase.
    pub fn unlock(&self, passphrase: Option<&str>) -> Result<UnlockedKey, CryptoError> {
        let material = self.open_secret(passphrase)?;
        Ok(UnlockedKey {
            key_id: self.key_id(),
            subkey_public: self.packet.subkey_public,
            subkey_secret: StaticSecret::from(material.subkey),
        })
    }

    fn open_secret(&self, passphrase: Option<&str>) -> Result<SecretMaterial, CryptoError> {
        match &self.packet.secret {
            None => Err(CryptoError::NotPrivateKey),
            Some(SecretSection::Plain(m)) => Ok(m.clone()),
            Some(SecretSection::Protected {
                s2k,
                nonce,
                ciphertext,
            }) => {
                let passphrase = passphrase.ok_or(CryptoError::KeyLocked)?;
                let kek = secret_kek(s2k, passphrase, &self.packet.primary_public);
                let plaintext = Zeroizing::new(
                    open(&kek, nonce, ciphertext).map_err(|_| CryptoError::WrongPassphrase)?,
                );
                let material: SecretMaterial = bincode::deserialize(&plaintext)?;
                self.check_material(&material)?;
                Ok(material)
            }
        }
    }

    fn check_material(&self, material: &SecretMaterial) -> Result<(), CryptoError> {
        let signing = SigningKey::from_bytes(&material.primary);
        let subkey = StaticSecret::from(material.subkey);
        if signing.verifying_key().to_bytes() != self.packet.primary_public
            || X25519Public::from(&subkey).to_bytes() != self.packet.subkey_public
        {
            return Err(CryptoError::InvalidKey("secret does not match public key".into()));
        }
        Ok(())
    }
}

/// Decrypted secret material ready for message decryption.
///
/// Zeroized on drop (the X25519 secret zeroizes itself).
pub struct UnlockedKey {
    key_id: KeyId,
    subkey_public: [u8; 32],
    subkey_secret: StaticSecret,
}

impl fmt::Debug for UnlockedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnlockedKey")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

impl UnlockedKey {
    /// Long id of the owning key.
    pub fn key_id(&self) -> KeyId {
        self.key_id
    }

    pub(crate) fn subkey_public(&self) -> &[u8; 32] {
        &self.subkey_public
    }

    pub(crate) fn diffie_hellman(&self, their_public: &[u8; 32]) -> Zeroizing<[u8; 32]> {
        let shared = self
            .subkey_secret
            .diffie_hellman(&X25519Public::from(*their_public));
        Zeroizing::new(shared.to_bytes())
    }
}
