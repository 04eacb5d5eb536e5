//! # Armor
//!
//! Text-safe encoding of binary keys and messages:
//!
//! ```text
//! -----BEGIN CIPHERLINK MESSAGE-----
//! Version: Cipherlink 0.1.0
//!
//! <base64, 64 columns>
//! =<base64 of the first 3 bytes of BLAKE3(data)>
//! -----END CIPHERLINK MESSAGE-----
//! ```

use crate::hashing::blake3_hash_many;
use crate::CryptoError;
use base64::{engine::general_purpose::STANDARD, Engine as _};

const BEGIN: &str = "-----BEGIN CIPHERLINK ";
const END: &str = "-----END CIPHERLINK ";
const DASHES: &str = "-----";
const LINE_WIDTH: usize = 64;

/// Kind of armored block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmorKind {
    PublicKey,
    PrivateKey,
    Message,
}

impl ArmorKind {
    fn label(&self) -> &'static str {
        match self {
            ArmorKind::PublicKey => "PUBLIC KEY BLOCK",
            ArmorKind::PrivateKey => "PRIVATE KEY BLOCK",
            ArmorKind::Message => "MESSAGE",
        }
    }

    fn from_label(label: &str) -> Option<Self> {
        match label {
            "PUBLIC KEY BLOCK" => Some(ArmorKind::PublicKey),
            "PRIVATE KEY BLOCK" => Some(ArmorKind::PrivateKey),
            "MESSAGE" => Some(ArmorKind::Message),
            _ => None,
        }
    }
}

/// Location of an armored block inside a larger text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArmoredSpan {
    pub kind: ArmorKind,
    /// Byte offset of the BEGIN line
    pub start: usize,
    /// Byte offset just past the END line
    pub end: usize,
}

/// Encode `data` as an armored block.
pub fn armor(kind: ArmorKind, data: &[u8]) -> String {
    let body = STANDARD.encode(data);
    let checksum = STANDARD.encode(&blake3_hash_many(&[data])[..3]);

    let mut out = String::with_capacity(body.len() + body.len() / LINE_WIDTH + 128);
    out.push_str(&format!("{BEGIN}{}{DASHES}\n", kind.label()));
    out.push_str(&format!("Version: Cipherlink {}\n\n", crate::VERSION));
    for line in body.as_bytes().chunks(LINE_WIDTH) {
        // base64 output is ASCII
        out.push_str(std::str::from_utf8(line).unwrap_or_default());
        out.push('\n');
    }
    out.push('=');
    out.push_str(&checksum);
    out.push('\n');
    out.push_str(&format!("{END}{}{DASHES}\n", kind.label()));
    out
}

/// Decode the first armored block in `text`.
pub fn dearmor(text: &str) -> Result<(ArmorKind, Vec<u8>), CryptoError> {
    let span = find_blocks(text)
        .into_iter()
        .next()
        .ok_or_else(|| CryptoError::Armor("no armored block found".into()))?;
    decode_span(text, &span)
}

/// Decode every armored block in `text`, in order.
pub fn dearmor_all(text: &str) -> Result<Vec<(ArmorKind, Vec<u8>)>, CryptoError> {
    find_blocks(text)
        .iter()
        .map(|span| decode_span(text, span))
        .collect()
}

/// Whether `data` starts (after whitespace) with an armor header.
pub fn is_armored(data: &[u8]) -> bool {
    let trimmed = data
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .map(|i| &data[i..])
        .unwrap_or_default();
    trimmed.starts_with(BEGIN.as_bytes())
}

/// Locate complete armored blocks. Unterminated blocks are ignored.
pub fn find_blocks(text: &str) -> Vec<ArmoredSpan> {
    let mut spans = Vec::new();
    let mut cursor = 0;

    while let Some(rel) = text[cursor..].find(BEGIN) {
        let start = cursor + rel;
        let after_begin = start + BEGIN.len();
        let Some(label_len) = text[after_begin..].find(DASHES) else {
            break;
        };
        let label = &text[after_begin..after_begin + label_len];
        let Some(kind) = ArmorKind::from_label(label) else {
            cursor = after_begin;
            continue;
        };

        // A block ends before the next BEGIN; otherwise it is unterminated
        let end_marker = format!("{END}{label}{DASHES}");
        let rest = &text[after_begin..];
        let end_rel = match rest.find(&end_marker) {
            Some(rel) if !rest[..rel].contains(BEGIN) => rel,
            _ => {
                cursor = after_begin;
                continue;
            }
        };
        let mut end = after_begin + end_rel + end_marker.len();
        if text[end..].starts_with("\r\n") {
            end += 2;
        } else if text[end..].starts_with('\n') {
            end += 1;
        }

        spans.push(ArmoredSpan { kind, start, end });
        cursor = end;
    }

    spans
}

fn decode_span(text: &str, span: &ArmoredSpan) -> Result<(ArmorKind, Vec<u8>), CryptoError> {
    let block = &text[span.start..span.end];
    let mut lines = block.lines().map(str::trim_end);

    // BEGIN line
    lines.next();

    // Header lines end at the first blank line
    for line in lines.by_ref() {
        if line.is_empty() {
            break;
        }
        if !line.contains(": ") {
            return Err(CryptoError::Armor("malformed armor header".into()));
        }
    }

    let mut body = String::new();
    let mut checksum = None;
    for line in lines {
        if line.starts_with(END) {
            break;
        }
        if let Some(sum) = line.strip_prefix('=') {
            checksum = Some(sum.to_string());
        } else {
            body.push_str(line.trim());
        }
    }

    let data = STANDARD
        .decode(body.as_bytes())
        .map_err(|e| CryptoError::Armor(format!("invalid base64: {e}")))?;

    if let Some(sum) = checksum {
        let expected = STANDARD.encode(&blake3_hash_many(&[&data])[..3]);
        if sum != expected {
            return Err(CryptoError::Armor("checksum mismatch".into()));
        }
    }

    Ok((span.kind, data))
}
