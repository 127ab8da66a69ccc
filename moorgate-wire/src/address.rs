//! Self-checking text form for chain addresses.
//!
//! An address is a 32-byte key plus a role: an externally-controlled
//! account (ed25519 public key) or a deployed contract. The text form is
//! base32 over `version || key || crc16`, which makes the role visible in
//! the first character and catches transcription errors:
//!
//! ```text
//! payload = version(1) || key(32) || crc16-xmodem(2, little-endian)
//! text    = base32(payload)     56 characters, A-Z 2-7, no padding
//! ```
//!
//! Account addresses start with `G`, contract addresses with `C`.

use std::fmt;
use std::str::FromStr;

/// Errors from parsing a text address.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum AddressError {
    /// The string is not exactly 56 characters.
    #[error("invalid address length: expected {expected} characters, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// The string contains a character outside the base32 alphabet.
    #[error("invalid base32 character")]
    InvalidCharacter,

    /// The version byte does not name a known address role.
    #[error("unknown address version byte {0:#04x}")]
    UnknownVersion(u8),

    /// The embedded checksum does not match the payload.
    #[error("address checksum mismatch")]
    ChecksumMismatch,
}

const ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// Version byte for account addresses; renders as a leading `G`.
const VERSION_ACCOUNT: u8 = 6 << 3;
/// Version byte for contract addresses; renders as a leading `C`.
const VERSION_CONTRACT: u8 = 2 << 3;

/// Decoded payload length: version + key + checksum.
const PAYLOAD_LEN: usize = 1 + 32 + 2;
/// Text length: 35 bytes is exactly 56 base32 characters.
const ENCODED_LEN: usize = 56;

/// A chain address: who can sign, or which contract is invoked.
///
/// `Display` renders the checked text form; `FromStr` parses and verifies
/// it. Equality and hashing are over the role and raw key bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum Address {
    /// Externally-controlled account, identified by its ed25519 public key.
    Account([u8; 32]),
    /// Deployed contract, identified by its 32-byte contract id.
    Contract([u8; 32]),
}

impl Address {
    /// The raw 32-byte key or contract id.
    #[must_use]
    pub fn key_bytes(&self) -> &[u8; 32] {
        match self {
            Address::Account(key) | Address::Contract(key) => key,
        }
    }

    /// True for contract addresses.
    #[must_use]
    pub fn is_contract(&self) -> bool {
        matches!(self, Address::Contract(_))
    }

    fn version_byte(&self) -> u8 {
        match self {
            Address::Account(_) => VERSION_ACCOUNT,
            Address::Contract(_) => VERSION_CONTRACT,
        }
    }

    fn from_parts(version: u8, key: [u8; 32]) -> Result<Self, AddressError> {
        match version {
            VERSION_ACCOUNT => Ok(Address::Account(key)),
            VERSION_CONTRACT => Ok(Address::Contract(key)),
            other => Err(AddressError::UnknownVersion(other)),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut payload = [0u8; PAYLOAD_LEN];
        payload[0] = self.version_byte();
        payload[1..33].copy_from_slice(self.key_bytes());
        let crc = crc16_xmodem(&payload[..33]);
        payload[33..35].copy_from_slice(&crc.to_le_bytes());
        f.write_str(&base32_encode(&payload))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != ENCODED_LEN {
            return Err(AddressError::InvalidLength {
                expected: ENCODED_LEN,
                actual: s.len(),
            });
        }
        let payload = base32_decode(s)?;

        let version = payload[0];
        let mut key = [0u8; 32];
        key.copy_from_slice(&payload[1..33]);
        let expected = crc16_xmodem(&payload[..33]);
        let actual = u16::from_le_bytes([payload[33], payload[34]]);
        if expected != actual {
            return Err(AddressError::ChecksumMismatch);
        }

        Address::from_parts(version, key)
    }
}

/// CRC16-XModem: polynomial 0x1021, initial value 0x0000.
fn crc16_xmodem(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &byte in data {
        crc ^= u16::from(byte) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

/// Encode 35 payload bytes as 56 base32 characters (no padding needed:
/// 35 bytes is 280 bits, an exact multiple of 5).
fn base32_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity(ENCODED_LEN);
    let mut acc: u32 = 0;
    let mut bits = 0;
    for &byte in data {
        acc = (acc << 8) | u32::from(byte);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            let index = ((acc >> bits) & 0x1f) as usize;
            out.push(ALPHABET[index] as char);
        }
    }
    out
}

/// Decode exactly 56 base32 characters into the 35-byte payload.
fn base32_decode(s: &str) -> Result<[u8; PAYLOAD_LEN], AddressError> {
    let mut out = [0u8; PAYLOAD_LEN];
    let mut acc: u32 = 0;
    let mut bits = 0;
    let mut pos = 0;
    for ch in s.bytes() {
        let index = ALPHABET
            .iter()
            .position(|&a| a == ch)
            .ok_or(AddressError::InvalidCharacter)?;
        acc = (acc << 5) | index as u32;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out[pos] = ((acc >> bits) & 0xff) as u8;
            pos += 1;
        }
    }
    Ok(out)
}
