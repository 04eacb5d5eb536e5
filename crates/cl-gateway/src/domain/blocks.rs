//! Decrypted content split into display blocks.
//!
//! Plain text becomes an `html` block (escaped, newlines as `<br>`).
//! Armored blocks embedded in the text are split out verbatim, in order.

use cl_crypto::{find_blocks, ArmorKind};
use serde::{Deserialize, Serialize};

/// Block content type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BlockType {
    /// Escaped plain text
    Html,
    /// Armored public key
    PublicKey,
    /// Armored private key
    PrivateKey,
    /// Armored encrypted message
    EncryptedMsg,
}

impl From<ArmorKind> for BlockType {
    fn from(kind: ArmorKind) -> Self {
        match kind {
            ArmorKind::PublicKey => BlockType::PublicKey,
            ArmorKind::PrivateKey => BlockType::PrivateKey,
            ArmorKind::Message => BlockType::EncryptedMsg,
        }
    }
}

/// One block of decrypted content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgBlock {
    /// Content type
    #[serde(rename = "type")]
    pub block_type: BlockType,
    /// Content
    pub content: String,
    /// Always true; blocks are never partial
    pub complete: bool,
}

impl MsgBlock {
    fn new(block_type: BlockType, content: String) -> Self {
        Self {
            block_type,
            content,
            complete: true,
        }
    }

    /// Content length in UTF-16 code units, as the host counts it.
    pub fn content_length(&self) -> usize {
        self.content.encode_utf16().count()
    }

    /// Type and length summary.
    pub fn meta(&self) -> BlockMeta {
        BlockMeta {
            block_type: self.block_type,
            length: self.content_length(),
        }
    }
}

/// Block summary sent in the result object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockMeta {
    /// Content type
    #[serde(rename = "type")]
    pub block_type: BlockType,
    /// Content length in UTF-16 code units
    pub length: usize,
}

/// Split decrypted bytes into blocks. Never returns an empty list.
pub fn fmt_decrypted(plaintext: &[u8]) -> Vec<MsgBlock> {
    let text = String::from_utf8_lossy(plaintext);
    let mut blocks = Vec::new();
    let mut cursor = 0;

    for span in find_blocks(&text) {
        push_text(&mut blocks, &text[cursor..span.start]);
        let armored = text[span.start..span.end].trim_end().to_string();
        blocks.push(MsgBlock::new(span.kind.into(), armored));
        cursor = span.end;
    }
    push_text(&mut blocks, &text[cursor..]);

    if blocks.is_empty() {
        blocks.push(MsgBlock::new(BlockType::Html, String::new()));
    }
    blocks
}

/// Payload encoding: one JSON block per line, no trailing newline.
pub fn encode_blocks(blocks: &[MsgBlock]) -> serde_json::Result<Vec<u8>> {
    let mut out = Vec::new();
    for (i, block) in blocks.iter().enumerate() {
        if i > 0 {
            out.push(b'\n');
        }
        serde_json::to_writer(&mut out, block)?;
    }
    Ok(out)
}

fn push_text(blocks: &mut Vec<MsgBlock>, text: &str) {
    if text.trim().is_empty() {
        return;
    }
    let text = text.strip_suffix('\n').unwrap_or(text);
    blocks.push(MsgBlock::new(BlockType::Html, text_to_html(text)));
}

fn text_to_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    for c in text.replace("\r\n", "\n").chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '\n' => out.push_str("<br>"),
            c => out.push(c),
        }
    }
    out
}
