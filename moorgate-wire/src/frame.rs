//! Transport framing for entry sequences.
//!
//! A challenge travels as one frame: a self-describing entry count followed
//! by the entries back to back, base64-encoded for transport. The count is
//! carried on the wire rather than fixed, so the same frame shape serves
//! 2-entry and 3-entry challenges (and future shapes) alike.
//!
//! ```text
//! frame = count(u32) entry*        then base64 (standard alphabet)
//! ```

use base64::prelude::*;

use crate::codec::{DecodeError, EncodeError, Reader};
use crate::entry::AuthorizationEntry;

/// Most entries one frame may carry.
pub const MAX_ENTRIES: usize = 16;
/// Largest decoded frame accepted, checked before any parsing.
pub const MAX_FRAME_BYTES: usize = 64 * 1024;

/// Encode entries into one binary frame.
///
/// # Errors
///
/// Fails if the sequence or any entry violates a wire limit.
pub fn encode_entries(entries: &[AuthorizationEntry]) -> Result<Vec<u8>, EncodeError> {
    if entries.len() > MAX_ENTRIES {
        return Err(EncodeError::TooMany {
            field: "entries",
            max: MAX_ENTRIES,
            actual: entries.len(),
        });
    }
    let mut out = Vec::new();
    out.extend_from_slice(&(entries.len() as u32).to_be_bytes());
    for entry in entries {
        entry.encode_into(&mut out)?;
    }
    if out.len() > MAX_FRAME_BYTES {
        return Err(EncodeError::FieldTooLong {
            field: "frame",
            max: MAX_FRAME_BYTES,
            actual: out.len(),
        });
    }
    Ok(out)
}

/// Decode one binary frame into its entries, rejecting trailing bytes.
///
/// # Errors
///
/// Any malformation in the frame or any entry inside it.
pub fn decode_entries(bytes: &[u8]) -> Result<Vec<AuthorizationEntry>, DecodeError> {
    if bytes.len() > MAX_FRAME_BYTES {
        return Err(DecodeError::FieldTooLong {
            field: "frame",
            max: MAX_FRAME_BYTES,
            actual: bytes.len(),
        });
    }
    let mut reader = Reader::new(bytes);
    let count = reader.read_count("entries", MAX_ENTRIES)?;
    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        entries.push(AuthorizationEntry::decode_from(&mut reader)?);
    }
    if reader.remaining() != 0 {
        return Err(DecodeError::TrailingBytes(reader.remaining()));
    }
    Ok(entries)
}

/// Encode entries to the base64 transport form.
///
/// # Errors
///
/// Fails if the sequence or any entry violates a wire limit.
pub fn entries_to_base64(entries: &[AuthorizationEntry]) -> Result<String, EncodeError> {
    Ok(BASE64_STANDARD.encode(encode_entries(entries)?))
}

/// Decode entries from the base64 transport form.
///
/// # Errors
///
/// [`DecodeError::InvalidBase64`] for bad base64, otherwise any frame
/// malformation.
pub fn entries_from_base64(encoded: &str) -> Result<Vec<AuthorizationEntry>, DecodeError> {
    let bytes = BASE64_STANDARD
        .decode(encoded.trim())
        .map_err(|_| DecodeError::InvalidBase64)?;
    decode_entries(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;
    use crate::entry::Invocation;
    use crate::value::Value;

    fn entry(seed: u8) -> AuthorizationEntry {
        AuthorizationEntry::unsigned(
            Address::Account([seed; 32]),
            Invocation {
                contract: Address::Contract([0xc0; 32]),
                function: "web_auth_verify".to_string(),
                args: vec![Value::Map(vec![(
                    Value::symbol("nonce"),
                    Value::string("7"),
                )])],
                sub_invocations: Vec::new(),
            },
        )
    }

    #[test]
    fn test_frame_roundtrip() {
        let entries = vec![entry(1), entry(2), entry(3)];
        let bytes = encode_entries(&entries).unwrap();

        assert_eq!(&bytes[..4], &3u32.to_be_bytes());
        assert_eq!(decode_entries(&bytes).unwrap(), entries);
    }

    #[test]
    fn test_empty_frame_roundtrip() {
        // An empty sequence is a valid frame; rejecting it is the
        // validation layer's job, not the codec's.
        let bytes = encode_entries(&[]).unwrap();
        assert_eq!(decode_entries(&bytes).unwrap(), Vec::new());
    }

    #[test]
    fn test_base64_roundtrip() {
        let entries = vec![entry(4), entry(5)];
        let encoded = entries_to_base64(&entries).unwrap();
        assert_eq!(entries_from_base64(&encoded).unwrap(), entries);
    }

    #[test]
    fn test_invalid_base64_rejected() {
        assert_eq!(
            entries_from_base64("!!! not base64 !!!"),
            Err(DecodeError::InvalidBase64)
        );
    }

    #[test]
    fn test_count_mismatch_rejected() {
        // Claims two entries, carries one.
        let mut bytes = encode_entries(&[entry(6)]).unwrap();
        bytes[3] = 2;
        assert_eq!(decode_entries(&bytes), Err(DecodeError::Truncated));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut bytes = encode_entries(&[entry(7)]).unwrap();
        bytes.push(0xff);
        assert_eq!(decode_entries(&bytes), Err(DecodeError::TrailingBytes(1)));
    }

    #[test]
    fn test_entry_count_cap() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&(MAX_ENTRIES as u32 + 1).to_be_bytes());
        assert!(matches!(
            decode_entries(&bytes),
            Err(DecodeError::TooMany { field: "entries", .. })
        ));
    }

    #[test]
    fn test_oversized_frame_rejected_before_parse() {
        let bytes = vec![0u8; MAX_FRAME_BYTES + 1];
        assert!(matches!(
            decode_entries(&bytes),
            Err(DecodeError::FieldTooLong { field: "frame", .. })
        ));
    }

    #[test]
    fn test_whitespace_tolerant_base64() {
        let encoded = entries_to_base64(&[entry(8)]).unwrap();
        let padded = format!("  {encoded}\n");
        assert_eq!(entries_from_base64(&padded).unwrap(), vec![entry(8)]);
    }
}
