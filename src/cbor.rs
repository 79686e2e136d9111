use std::fmt;

/// Diagnostic text that `cbor_diag` could not parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CborError(String);

impl fmt::Display for CborError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for CborError {}

/// Encodes CBOR diagnostic notation, e.g. `[1, h'00ff', null]`, to CBOR bytes.
pub fn diag_to_cbor(text: &str) -> Result<Vec<u8>, CborError> {
    cbor_diag::parse_diag(text.trim())
        .map(|item| item.to_bytes())
        .map_err(|e| CborError(format!("{e:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_is_single_byte() {
        assert_eq!(diag_to_cbor("null").unwrap(), vec![0xf6]);
        assert_eq!(diag_to_cbor("  null ").unwrap(), vec![0xf6]);
    }

    #[test]
    fn test_array_of_ints() {
        assert_eq!(diag_to_cbor("[1, 0]").unwrap(), vec![0x82, 0x01, 0x00]);
    }

    #[test]
    fn test_byte_string() {
        assert_eq!(diag_to_cbor("h'00ff'").unwrap(), vec![0x42, 0x00, 0xff]);
    }

    #[test]
    fn test_malformed_text() {
        assert!(diag_to_cbor("[1, ").is_err());
        assert!(diag_to_cbor("not cbor").is_err());
    }
}
