//! Conversion between operator-typed hex text and raw bytes.

use std::fmt;

/// Errors produced while reading hex byte pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HexError {
    /// A token holding something other than hex digits.
    InvalidChar { token: String, ch: char },
    /// A token with an odd number of digits, e.g. the `0` in `0 1`.
    OddDigit { token: String },
}

impl HexError {
    fn from_token(token: &str, err: hex::FromHexError) -> Self {
        match err {
            hex::FromHexError::InvalidHexCharacter { c, .. } => HexError::InvalidChar {
                token: token.to_string(),
                ch: c,
            },
            _ => HexError::OddDigit {
                token: token.to_string(),
            },
        }
    }
}

impl fmt::Display for HexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HexError::InvalidChar { token, ch } => {
                write!(f, "non-hexadecimal character {ch:?} in {token:?}")
            }
            HexError::OddDigit { token } => write!(f, "odd number of hex digits in {token:?}"),
        }
    }
}

impl std::error::Error for HexError {}

/// Parses whitespace-separated hex byte pairs, e.g. `"01 ff a0"`.
///
/// Whitespace may appear only between bytes, so `"01ffa0"` is accepted as well
/// while `"0 1"` is not. Blank input parses to an empty vector.
pub fn parse_hex(text: &str) -> Result<Vec<u8>, HexError> {
    let mut out = Vec::with_capacity(text.len() / 2);
    for token in text.split_ascii_whitespace() {
        let bytes = hex::decode(token).map_err(|e| HexError::from_token(token, e))?;
        out.extend_from_slice(&bytes);
    }
    Ok(out)
}

/// Formats bytes as lower-case hex pairs separated by single spaces.
pub fn format_hex(data: &[u8]) -> String {
    data.chunks(1)
        .map(hex::encode)
        .collect::<Vec<_>>()
        .join(" ")
}
