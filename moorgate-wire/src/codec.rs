//! Bounds-checked primitives shared by the value, entry, and frame codecs.

/// Errors from decoding untrusted wire bytes.
///
/// Every variant is a distinct malformation so callers can report exactly
/// what was wrong with the input without re-parsing it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum DecodeError {
    /// The input ended before the structure was complete.
    #[error("unexpected end of input")]
    Truncated,

    /// Bytes remained after the outermost structure was fully decoded.
    #[error("{0} trailing bytes after frame")]
    TrailingBytes(usize),

    /// Not valid base64.
    #[error("invalid base64")]
    InvalidBase64,

    /// A value carried a tag byte this version does not define.
    #[error("unknown value tag {0:#04x}")]
    UnknownValueTag(u8),

    /// An address carried a kind byte this version does not define.
    #[error("unknown address kind {0:#04x}")]
    UnknownAddressKind(u8),

    /// Credentials carried a kind byte this version does not define.
    #[error("unknown credentials kind {0:#04x}")]
    UnknownCredentialsKind(u8),

    /// The entry version byte is not one this decoder supports.
    #[error("unsupported entry version {0}")]
    UnsupportedVersion(u8),

    /// A length-prefixed field exceeds its cap.
    #[error("{field} length {actual} exceeds limit {max}")]
    FieldTooLong {
        field: &'static str,
        max: usize,
        actual: usize,
    },

    /// A count-prefixed collection exceeds its cap.
    #[error("{field} count {actual} exceeds limit {max}")]
    TooMany {
        field: &'static str,
        max: usize,
        actual: usize,
    },

    /// Nested structures exceed the depth cap.
    #[error("nesting exceeds depth limit {0}")]
    TooDeep(usize),

    /// A string field is not valid UTF-8.
    #[error("invalid UTF-8 in {0}")]
    InvalidUtf8(&'static str),

    /// A symbol contains a character outside `[a-zA-Z0-9_]`.
    #[error("invalid symbol character")]
    InvalidSymbol,
}

/// Errors from encoding a structure that violates wire limits.
///
/// Encode limits mirror the decode caps so anything we emit is something
/// we would also accept back.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum EncodeError {
    /// A symbol is empty, too long, or contains invalid characters.
    #[error("symbol must be 1-{max} characters of [a-zA-Z0-9_]", max = crate::value::MAX_SYMBOL_LEN)]
    InvalidSymbol,

    /// A field exceeds its wire cap.
    #[error("{field} length {actual} exceeds limit {max}")]
    FieldTooLong {
        field: &'static str,
        max: usize,
        actual: usize,
    },

    /// A collection exceeds its wire cap.
    #[error("{field} count {actual} exceeds limit {max}")]
    TooMany {
        field: &'static str,
        max: usize,
        actual: usize,
    },

    /// Nested structures exceed the depth cap.
    #[error("nesting exceeds depth limit {0}")]
    TooDeep(usize),
}

/// Cursor over untrusted input. Every read is bounds-checked; reads past
/// the end return [`DecodeError::Truncated`] rather than panicking.
pub(crate) struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, DecodeError> {
        let byte = *self.buf.get(self.pos).ok_or(DecodeError::Truncated)?;
        self.pos += 1;
        Ok(byte)
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32, DecodeError> {
        let bytes: [u8; 4] = self.read_bytes(4)?.try_into().map_err(|_| DecodeError::Truncated)?;
        Ok(u32::from_be_bytes(bytes))
    }

    pub(crate) fn read_i64(&mut self) -> Result<i64, DecodeError> {
        let bytes: [u8; 8] = self.read_bytes(8)?.try_into().map_err(|_| DecodeError::Truncated)?;
        Ok(i64::from_be_bytes(bytes))
    }

    pub(crate) fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        let end = self.pos.checked_add(len).ok_or(DecodeError::Truncated)?;
        if end > self.buf.len() {
            return Err(DecodeError::Truncated);
        }
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    /// Read a u32 count and check it against a cap before any allocation.
    pub(crate) fn read_count(&mut self, field: &'static str, max: usize) -> Result<usize, DecodeError> {
        let count = self.read_u32()? as usize;
        if count > max {
            return Err(DecodeError::TooMany { field, max, actual: count });
        }
        Ok(count)
    }
}
