//! Hex transport tokens for offset keys.
//!
//! Only token encoding and decoding lives here; the token carries the raw
//! offset key bytes and nothing else.

use super::MAX_OFFSET_KEY_LEN;
use std::fmt::Write as _;
use thiserror::Error;

/// Bound on untrusted token input.
pub const MAX_TOKEN_HEX_LEN: usize = MAX_OFFSET_KEY_LEN * 2;

#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum TokenDecodeError {
    #[error("token is empty")]
    Empty,

    #[error("token exceeds max length: {len} hex chars (max {max})")]
    TooLong { len: usize, max: usize },

    #[error("token must have an even number of hex characters")]
    OddLength,

    #[error("invalid hex character at position {position}")]
    InvalidHex { position: usize },
}

/// Encodes bytes as a lowercase hex token.
pub fn encode_token(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Decodes a hex token of either case. Surrounding whitespace is trimmed.
pub fn decode_token(token: &str) -> Result<Vec<u8>, TokenDecodeError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(TokenDecodeError::Empty);
    }
    if token.len() > MAX_TOKEN_HEX_LEN {
        return Err(TokenDecodeError::TooLong {
            len: token.len(),
            max: MAX_TOKEN_HEX_LEN,
        });
    }
    if token.len() % 2 != 0 {
        return Err(TokenDecodeError::OddLength);
    }

    let bytes = token.as_bytes();
    let mut out = Vec::with_capacity(bytes.len() / 2);
    for idx in (0..bytes.len()).step_by(2) {
        let hi = nibble(bytes[idx]).ok_or(TokenDecodeError::InvalidHex { position: idx + 1 })?;
        let lo = nibble(bytes[idx + 1]).ok_or(TokenDecodeError::InvalidHex { position: idx + 2 })?;
        out.push((hi << 4) | lo);
    }
    Ok(out)
}

const fn nibble(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}
