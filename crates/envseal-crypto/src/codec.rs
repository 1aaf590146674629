//! Text encodings: base64 fields and PEM key blocks
//!
//! Base64 uses the standard alphabet with canonical padding, so every byte
//! string has exactly one accepted encoding.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::{CryptoError, CryptoResult};

pub(crate) const PUBLIC_KEY_LABEL: &str = "PUBLIC KEY";
pub(crate) const PRIVATE_KEY_LABEL: &str = "PRIVATE KEY";
const PEM_LINE_WIDTH: usize = 64;

pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

pub fn decode_base64(s: &str) -> CryptoResult<Vec<u8>> {
    STANDARD
        .decode(s)
        .map_err(|e| CryptoError::Decode(e.to_string()))
}

/// Decode a `BEGIN/END PUBLIC KEY` PEM block to its DER bytes.
pub fn parse_pem(text: &str) -> CryptoResult<Vec<u8>> {
    parse_pem_block(text, PUBLIC_KEY_LABEL)
}

/// Decode a PEM block with the given label to its DER bytes.
///
/// Everything between the framing lines is base64 once whitespace is removed.
/// Text outside the framing is ignored.
pub fn parse_pem_block(text: &str, label: &str) -> CryptoResult<Vec<u8>> {
    let begin = format!("-----BEGIN {label}-----");
    let end = format!("-----END {label}-----");

    let body_start = text
        .find(&begin)
        .map(|i| i + begin.len())
        .ok_or_else(|| CryptoError::Format(format!("missing \"{begin}\" marker")))?;
    let body_len = text[body_start..]
        .find(&end)
        .ok_or_else(|| CryptoError::Format(format!("missing \"{end}\" marker")))?;

    let body: String = text[body_start..body_start + body_len]
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if body.is_empty() {
        return Err(CryptoError::Format(format!("empty {label} block")));
    }

    STANDARD
        .decode(body.as_bytes())
        .map_err(|e| CryptoError::Format(format!("{label} body is not base64: {e}")))
}

/// Render DER bytes as a PEM block with 64-column body lines.
pub fn encode_pem(label: &str, der: &[u8]) -> String {
    let body = STANDARD.encode(der);
    let mut pem = String::with_capacity(body.len() + body.len() / PEM_LINE_WIDTH + 64);
    pem.push_str(&format!("-----BEGIN {label}-----\n"));
    // base64 output is ASCII, so every byte offset is a char boundary
    let mut rest = body.as_str();
    while !rest.is_empty() {
        let (line, tail) = rest.split_at(rest.len().min(PEM_LINE_WIDTH));
        pem.push_str(line);
        pem.push('\n');
        rest = tail;
    }
    pem.push_str(&format!("-----END {label}-----\n"));
    pem
}
