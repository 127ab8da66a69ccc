//! Structured argument values.
//!
//! Invocation arguments are [`Value`]s: symbols (short identifiers such as
//! map keys and function-adjacent names), UTF-8 strings, and ordered
//! key/value maps. The challenge argument map is a `Map` with `Symbol` keys
//! and `Str` values, but the codec itself is shape-agnostic; shape rules
//! are enforced by the validation layer.
//!
//! Wire format, integers big-endian:
//!
//! ```text
//! value  = 0x01 len(u8)  bytes     symbol, [a-zA-Z0-9_], 1-32 bytes
//!        | 0x02 len(u32) bytes     string, UTF-8
//!        | 0x03 count(u32) { value value }*   map, ordered pairs
//! ```
//!
//! Map equality is pairwise and order-sensitive, which together with the
//! deterministic encoder means two equal maps always encode to identical
//! bytes.

use crate::codec::{DecodeError, EncodeError, Reader};

/// Longest symbol the wire accepts.
pub const MAX_SYMBOL_LEN: usize = 32;
/// Longest string the wire accepts.
pub const MAX_STRING_LEN: usize = 4096;
/// Most pairs one map may carry.
pub const MAX_MAP_ENTRIES: usize = 32;
/// Deepest value nesting the wire accepts.
pub const MAX_VALUE_DEPTH: usize = 8;

const TAG_SYMBOL: u8 = 0x01;
const TAG_STR: u8 = 0x02;
const TAG_MAP: u8 = 0x03;

/// A structured argument value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Short identifier: 1-32 bytes of `[a-zA-Z0-9_]`.
    Symbol(String),
    /// UTF-8 string.
    Str(String),
    /// Ordered key/value pairs.
    Map(Vec<(Value, Value)>),
}

impl Value {
    /// Build a symbol value. Charset and length are checked at encode time.
    pub fn symbol(s: impl Into<String>) -> Self {
        Value::Symbol(s.into())
    }

    /// Build a string value.
    pub fn string(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    /// The symbol text, if this is a symbol.
    #[must_use]
    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Value::Symbol(s) => Some(s),
            _ => None,
        }
    }

    /// The string text, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The pairs, if this is a map.
    #[must_use]
    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Map(pairs) => Some(pairs),
            _ => None,
        }
    }

    /// Encode this value to a fresh buffer.
    ///
    /// # Errors
    ///
    /// Fails if any nested piece violates a wire limit.
    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        let mut out = Vec::new();
        self.encode_into(&mut out, 0)?;
        Ok(out)
    }

    pub(crate) fn encode_into(&self, out: &mut Vec<u8>, depth: usize) -> Result<(), EncodeError> {
        if depth >= MAX_VALUE_DEPTH {
            return Err(EncodeError::TooDeep(MAX_VALUE_DEPTH));
        }
        match self {
            Value::Symbol(s) => {
                check_symbol(s)?;
                out.push(TAG_SYMBOL);
                out.push(s.len() as u8);
                out.extend_from_slice(s.as_bytes());
            }
            Value::Str(s) => {
                if s.len() > MAX_STRING_LEN {
                    return Err(EncodeError::FieldTooLong {
                        field: "string",
                        max: MAX_STRING_LEN,
                        actual: s.len(),
                    });
                }
                out.push(TAG_STR);
                out.extend_from_slice(&(s.len() as u32).to_be_bytes());
                out.extend_from_slice(s.as_bytes());
            }
            Value::Map(pairs) => {
                if pairs.len() > MAX_MAP_ENTRIES {
                    return Err(EncodeError::TooMany {
                        field: "map",
                        max: MAX_MAP_ENTRIES,
                        actual: pairs.len(),
                    });
                }
                out.push(TAG_MAP);
                out.extend_from_slice(&(pairs.len() as u32).to_be_bytes());
                for (key, value) in pairs {
                    key.encode_into(out, depth + 1)?;
                    value.encode_into(out, depth + 1)?;
                }
            }
        }
        Ok(())
    }

    /// Decode a single value from `bytes`, rejecting trailing input.
    ///
    /// # Errors
    ///
    /// Any malformation: truncation, unknown tags, limit violations,
    /// invalid UTF-8, trailing bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = Reader::new(bytes);
        let value = Self::decode_at(&mut reader, 0)?;
        if reader.remaining() != 0 {
            return Err(DecodeError::TrailingBytes(reader.remaining()));
        }
        Ok(value)
    }

    pub(crate) fn decode_at(reader: &mut Reader<'_>, depth: usize) -> Result<Self, DecodeError> {
        if depth >= MAX_VALUE_DEPTH {
            return Err(DecodeError::TooDeep(MAX_VALUE_DEPTH));
        }
        match reader.read_u8()? {
            TAG_SYMBOL => {
                let len = reader.read_u8()? as usize;
                if len == 0 || len > MAX_SYMBOL_LEN {
                    return Err(DecodeError::FieldTooLong {
                        field: "symbol",
                        max: MAX_SYMBOL_LEN,
                        actual: len,
                    });
                }
                let bytes = reader.read_bytes(len)?;
                if !bytes.iter().copied().all(is_symbol_byte) {
                    return Err(DecodeError::InvalidSymbol);
                }
                // Symbol bytes are ASCII, so UTF-8 conversion cannot fail.
                let text = std::str::from_utf8(bytes)
                    .map_err(|_| DecodeError::InvalidUtf8("symbol"))?;
                Ok(Value::Symbol(text.to_string()))
            }
            TAG_STR => {
                let len = reader.read_u32()? as usize;
                if len > MAX_STRING_LEN {
                    return Err(DecodeError::FieldTooLong {
                        field: "string",
                        max: MAX_STRING_LEN,
                        actual: len,
                    });
                }
                let bytes = reader.read_bytes(len)?;
                let text = std::str::from_utf8(bytes)
                    .map_err(|_| DecodeError::InvalidUtf8("string"))?;
                Ok(Value::Str(text.to_string()))
            }
            TAG_MAP => {
                let count = reader.read_count("map", MAX_MAP_ENTRIES)?;
                let mut pairs = Vec::with_capacity(count);
                for _ in 0..count {
                    let key = Self::decode_at(reader, depth + 1)?;
                    let value = Self::decode_at(reader, depth + 1)?;
                    pairs.push((key, value));
                }
                Ok(Value::Map(pairs))
            }
            other => Err(DecodeError::UnknownValueTag(other)),
        }
    }
}

fn is_symbol_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn check_symbol(s: &str) -> Result<(), EncodeError> {
    if s.is_empty() || s.len() > MAX_SYMBOL_LEN || !s.bytes().all(is_symbol_byte) {
        return Err(EncodeError::InvalidSymbol);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_roundtrip() {
        let value = Value::symbol("web_auth_domain");
        let bytes = value.encode().unwrap();

        assert_eq!(bytes[0], TAG_SYMBOL);
        assert_eq!(Value::decode(&bytes).unwrap(), value);
    }

    #[test]
    fn test_string_roundtrip() {
        let value = Value::string("example.com");
        let bytes = value.encode().unwrap();
        assert_eq!(Value::decode(&bytes).unwrap(), value);
    }

    #[test]
    fn test_map_roundtrip_preserves_order() {
        let value = Value::Map(vec![
            (Value::symbol("account"), Value::string("GABC")),
            (Value::symbol("nonce"), Value::string("12345")),
        ]);
        let bytes = value.encode().unwrap();

        let decoded = Value::decode(&bytes).unwrap();
        assert_eq!(decoded, value);
        let pairs = decoded.as_map().unwrap();
        assert_eq!(pairs[0].0.as_symbol(), Some("account"));
        assert_eq!(pairs[1].0.as_symbol(), Some("nonce"));
    }

    #[test]
    fn test_map_order_affects_equality_and_bytes() {
        let forward = Value::Map(vec![
            (Value::symbol("a"), Value::string("1")),
            (Value::symbol("b"), Value::string("2")),
        ]);
        let backward = Value::Map(vec![
            (Value::symbol("b"), Value::string("2")),
            (Value::symbol("a"), Value::string("1")),
        ]);

        assert_ne!(forward, backward);
        assert_ne!(forward.encode().unwrap(), backward.encode().unwrap());
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let value = Value::Map(vec![(Value::symbol("k"), Value::string("v"))]);
        assert_eq!(value.encode().unwrap(), value.encode().unwrap());
    }

    #[test]
    fn test_empty_symbol_rejected_both_ways() {
        assert_eq!(
            Value::symbol("").encode(),
            Err(EncodeError::InvalidSymbol)
        );

        // Hand-built wire bytes with a zero-length symbol.
        let bytes = [TAG_SYMBOL, 0x00];
        assert!(matches!(
            Value::decode(&bytes),
            Err(DecodeError::FieldTooLong { field: "symbol", .. })
        ));
    }

    #[test]
    fn test_symbol_charset_enforced() {
        assert_eq!(
            Value::symbol("has space").encode(),
            Err(EncodeError::InvalidSymbol)
        );

        let bytes = [TAG_SYMBOL, 0x01, b'!'];
        assert_eq!(Value::decode(&bytes), Err(DecodeError::InvalidSymbol));
    }

    #[test]
    fn test_unknown_tag_rejected() {
        assert_eq!(Value::decode(&[0x7f]), Err(DecodeError::UnknownValueTag(0x7f)));
    }

    #[test]
    fn test_truncated_string_rejected() {
        // Claims 100 bytes, supplies 2.
        let mut bytes = vec![TAG_STR];
        bytes.extend_from_slice(&100u32.to_be_bytes());
        bytes.extend_from_slice(b"ab");
        assert_eq!(Value::decode(&bytes), Err(DecodeError::Truncated));
    }

    #[test]
    fn test_oversized_string_length_rejected_before_read() {
        let mut bytes = vec![TAG_STR];
        bytes.extend_from_slice(&(u32::MAX).to_be_bytes());
        assert!(matches!(
            Value::decode(&bytes),
            Err(DecodeError::FieldTooLong { field: "string", .. })
        ));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut bytes = Value::string("x").encode().unwrap();
        bytes.push(0x00);
        assert_eq!(Value::decode(&bytes), Err(DecodeError::TrailingBytes(1)));
    }

    #[test]
    fn test_depth_limit_enforced() {
        let mut value = Value::string("leaf");
        for _ in 0..MAX_VALUE_DEPTH {
            value = Value::Map(vec![(Value::symbol("k"), value)]);
        }
        assert_eq!(value.encode(), Err(EncodeError::TooDeep(MAX_VALUE_DEPTH)));

        // The decoder applies the same cap to hand-built bytes: a chain of
        // single-pair maps nested past the limit.
        let mut bytes = Vec::new();
        for _ in 0..=MAX_VALUE_DEPTH {
            bytes.push(TAG_MAP);
            bytes.extend_from_slice(&1u32.to_be_bytes());
            bytes.extend_from_slice(&[TAG_SYMBOL, 0x01, b'k']);
        }
        assert_eq!(Value::decode(&bytes), Err(DecodeError::TooDeep(MAX_VALUE_DEPTH)));
    }

    #[test]
    fn test_invalid_utf8_string_rejected() {
        let mut bytes = vec![TAG_STR];
        bytes.extend_from_slice(&2u32.to_be_bytes());
        bytes.extend_from_slice(&[0xff, 0xfe]);
        assert_eq!(Value::decode(&bytes), Err(DecodeError::InvalidUtf8("string")));
    }
}
