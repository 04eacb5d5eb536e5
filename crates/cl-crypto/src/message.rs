//! # Messages
//!
//! Hybrid encryption. A random session key seals the literal data; the
//! session key is wrapped once per recipient (ephemeral X25519 agreement)
//! and optionally once more under a message password.
//!
//! Binary layout: `CLM1` magic followed by the bincode-encoded packet.

use crate::armor::{self, ArmorKind};
use crate::hashing::{blake3_derive_key, S2kParams, DEFAULT_S2K_COUNT};
use crate::keys::{Key, KeyId, UnlockedKey};
use crate::symmetric::{generate_nonce, open, seal, SecretKey};
use crate::CryptoError;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;
use x25519_dalek::{PublicKey as X25519Public, StaticSecret};
use zeroize::Zeroizing;

const MESSAGE_MAGIC: &[u8; 4] = b"CLM1";
const RECIPIENT_KEK_CONTEXT: &str = "cipherlink message kek v1";
const PASSWORD_KEK_CONTEXT: &str = "cipherlink message password v1";

#[derive(Serialize, Deserialize)]
struct MessagePacket {
    recipients: Vec<RecipientStanza>,
    password: Option<PasswordStanza>,
    nonce: [u8; 24],
    ciphertext: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct RecipientStanza {
    key_id: KeyId,
    ephemeral: [u8; 32],
    nonce: [u8; 24],
    wrapped: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct PasswordStanza {
    s2k: S2kParams,
    nonce: [u8; 24],
    wrapped: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct LiteralData {
    filename: Option<String>,
    created: u64,
    data: Vec<u8>,
}

/// Options for [`encrypt`].
#[derive(Debug, Clone, Default)]
pub struct EncryptOptions {
    /// File name stored inside the message
    pub filename: Option<String>,
    /// Produce armored text instead of binary
    pub armor: bool,
    /// Additionally allow decryption with this password
    pub password: Option<String>,
}

/// What can be learned about a message without decrypting it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageInfo {
    /// Long ids the session key is wrapped for, in stanza order
    pub recipients: Vec<KeyId>,
    /// Whether a password stanza is present
    pub has_password: bool,
}

/// Decrypted literal data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decrypted {
    /// Plaintext bytes
    pub data: Vec<u8>,
    /// File name recorded at encryption time
    pub filename: Option<String>,
}

fn recipient_kek(shared: &[u8; 32], ephemeral: &[u8; 32], recipient: &[u8; 32]) -> Zeroizing<[u8; 32]> {
    blake3_derive_key(RECIPIENT_KEK_CONTEXT, &[shared, ephemeral, recipient])
}

fn password_kek(s2k: &S2kParams, password: &str) -> Zeroizing<[u8; 32]> {
    let stretched = s2k.derive(password);
    blake3_derive_key(PASSWORD_KEK_CONTEXT, &[stretched.as_slice()])
}

/// Encrypt `plaintext` for every key in `recipients`.
pub fn encrypt(
    recipients: &[Key],
    plaintext: &[u8],
    options: &EncryptOptions,
) -> Result<Vec<u8>, CryptoError> {
    if recipients.is_empty() && options.password.is_none() {
        return Err(CryptoError::NoRecipients);
    }

    let session = SecretKey::generate();
    let mut rng = rand::thread_rng();

    let mut stanzas = Vec::with_capacity(recipients.len());
    for recipient in recipients {
        let recipient_public = recipient.encryption_key();
        let ephemeral = StaticSecret::random_from_rng(&mut rng);
        let ephemeral_public = X25519Public::from(&ephemeral).to_bytes();
        let shared = Zeroizing::new(
            ephemeral
                .diffie_hellman(&X25519Public::from(recipient_public))
                .to_bytes(),
        );
        let kek = recipient_kek(&shared, &ephemeral_public, &recipient_public);
        let nonce = generate_nonce();
        stanzas.push(RecipientStanza {
            key_id: recipient.key_id(),
            ephemeral: ephemeral_public,
            nonce,
            wrapped: seal(&kek, &nonce, session.as_bytes())?,
        });
    }

    let password = match &options.password {
        Some(password) => {
            let s2k = S2kParams::generate(DEFAULT_S2K_COUNT);
            let nonce = generate_nonce();
            let kek = password_kek(&s2k, password);
            Some(PasswordStanza {
                s2k,
                nonce,
                wrapped: seal(&kek, &nonce, session.as_bytes())?,
            })
        }
        None => None,
    };

    let literal = LiteralData {
        filename: options.filename.clone(),
        created: SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default(),
        data: plaintext.to_vec(),
    };
    let body = Zeroizing::new(bincode::serialize(&literal)?);
    let nonce = generate_nonce();
    let packet = MessagePacket {
        recipients: stanzas,
        password,
        nonce,
        ciphertext: seal(session.as_bytes(), &nonce, &body)?,
    };

    let mut out = MESSAGE_MAGIC.to_vec();
    out.extend_from_slice(&bincode::serialize(&packet)?);
    debug!(
        recipients = recipients.len(),
        armored = options.armor,
        size = out.len(),
        "Message encrypted"
    );

    if options.armor {
        Ok(armor::armor(ArmorKind::Message, &out).into_bytes())
    } else {
        Ok(out)
    }
}

fn decode(data: &[u8]) -> Result<MessagePacket, CryptoError> {
    let binary;
    let bytes = if armor::is_armored(data) {
        let text = std::str::from_utf8(data)
            .map_err(|_| CryptoError::Armor("armored message is not UTF-8".into()))?;
        let (kind, decoded) = armor::dearmor(text)?;
        if kind != ArmorKind::Message {
            return Err(CryptoError::Format("armored block is not a message".into()));
        }
        binary = decoded;
        binary.as_slice()
    } else {
        data
    };

    let body = bytes
        .strip_prefix(MESSAGE_MAGIC.as_slice())
        .ok_or_else(|| CryptoError::Format("not an encrypted message".into()))?;
    Ok(bincode::deserialize(body)?)
}

/// List recipients and password protection without decrypting.
pub fn inspect(data: &[u8]) -> Result<MessageInfo, CryptoError> {
    let packet = decode(data)?;
    Ok(MessageInfo {
        recipients: packet.recipients.iter().map(|s| s.key_id).collect(),
        has_password: packet.password.is_some(),
    })
}

/// Decrypt with the first matching key, falling back to the message password.
pub fn decrypt(
    keys: &[&UnlockedKey],
    data: &[u8],
    password: Option<&str>,
) -> Result<Decrypted, CryptoError> {
    let packet = decode(data)?;

    let mut session = None;
    for stanza in &packet.recipients {
        let Some(key) = keys.iter().find(|k| k.key_id() == stanza.key_id) else {
            continue;
        };
        let shared = key.diffie_hellman(&stanza.ephemeral);
        let kek = recipient_kek(&shared, &stanza.ephemeral, key.subkey_public());
        match open(&kek, &stanza.nonce, &stanza.wrapped) {
            Ok(bytes) => {
                session = Some(Zeroizing::new(bytes));
                break;
            }
            Err(_) => debug!(longid = %stanza.key_id, "Recipient stanza did not open"),
        }
    }

    if session.is_none() {
        session = match (&packet.password, password) {
            (Some(stanza), Some(password)) => {
                let kek = password_kek(&stanza.s2k, password);
                let bytes = open(&kek, &stanza.nonce, &stanza.wrapped)
                    .map_err(|_| CryptoError::WrongPassword)?;
                Some(Zeroizing::new(bytes))
            }
            (Some(_), None) => return Err(CryptoError::PasswordRequired),
            (None, _) => return Err(CryptoError::NoMatchingKey),
        };
    }

    let session = session.ok_or(CryptoError::NoMatchingKey)?;
    let session: [u8; 32] = session
        .as_slice()
        .try_into()
        .map_err(|_| CryptoError::Format("bad session key length".into()))?;
    let session = SecretKey::from_bytes(session);

    let body = Zeroizing::new(open(session.as_bytes(), &packet.nonce, &packet.ciphertext)?);
    let literal: LiteralData = bincode::deserialize(&body)?;
    Ok(Decrypted {
        data: literal.data,
        filename: literal.filename,
    })
}
