//! Authorization entries.
//!
//! An entry authorizes one participant's role in a contract invocation:
//! credentials naming (and eventually signed by) the participant, plus the
//! invocation tree being authorized. Challenges are sequences of entries
//! that share one invocation and differ only in credentials.
//!
//! Wire format (v1), integers big-endian:
//!
//! ```text
//! entry       = version(0x01) credentials invocation
//! credentials = 0x00                                          source account
//!             | 0x01 address valid_until(i64) sig_len(u32) sig  address-based
//! address     = kind(1) key(32)          kind 0x00 account, 0x01 contract
//! invocation  = address fn_len(u8) fn_name
//!               arg_count(u32) value*
//!               sub_count(u32) invocation*
//! ```
//!
//! `valid_until` is Unix seconds; unsigned entries carry 0 and an empty
//! signature. The signature bytes are opaque here: their shape is defined
//! by the account being authorized (a raw ed25519 signature for key-held
//! accounts, a structured blob for contract accounts) and only the
//! execution layer interprets them.

use sha2::{Digest, Sha256};

use crate::address::Address;
use crate::codec::{DecodeError, EncodeError, Reader};
use crate::value::Value;

/// Longest function name the wire accepts; same symbol rules as map keys.
pub const MAX_FUNCTION_LEN: usize = 32;
/// Most arguments one invocation may carry.
pub const MAX_ARGS: usize = 32;
/// Most nested invocations one invocation may carry.
pub const MAX_SUB_INVOCATIONS: usize = 16;
/// Deepest invocation nesting the wire accepts.
pub const MAX_INVOCATION_DEPTH: usize = 4;
/// Longest signature blob the wire accepts.
pub const MAX_SIGNATURE_LEN: usize = 16 * 1024;

/// Entry wire version this codec reads and writes.
pub const ENTRY_VERSION: u8 = 1;

const CRED_SOURCE: u8 = 0x00;
const CRED_ADDRESS: u8 = 0x01;

const ADDR_ACCOUNT: u8 = 0x00;
const ADDR_CONTRACT: u8 = 0x01;

/// Who authorizes an entry, and with what proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Authorized implicitly by the enclosing transaction's source account.
    /// Carries no address and no signature.
    SourceAccount,
    /// Authorized by a specific address with an attached signature.
    Address {
        address: Address,
        /// Latest Unix second at which the signature is valid; 0 while unsigned.
        valid_until: i64,
        /// Opaque signature blob; empty while unsigned.
        signature: Vec<u8>,
    },
}

impl Credentials {
    /// The authorizing address, if these credentials carry one.
    #[must_use]
    pub fn address(&self) -> Option<&Address> {
        match self {
            Credentials::SourceAccount => None,
            Credentials::Address { address, .. } => Some(address),
        }
    }

    /// The signature blob, if these credentials carry one.
    #[must_use]
    pub fn signature(&self) -> Option<&[u8]> {
        match self {
            Credentials::SourceAccount => None,
            Credentials::Address { signature, .. } => Some(signature),
        }
    }
}

/// One node of the invocation tree: which contract, which function, which
/// arguments, and any nested invocations it makes in turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub contract: Address,
    pub function: String,
    pub args: Vec<Value>,
    pub sub_invocations: Vec<Invocation>,
}

impl Invocation {
    /// Canonical bytes of this invocation: its deterministic wire encoding.
    ///
    /// Stable across encode/decode cycles, so both sides of the protocol
    /// derive identical hashes from the same invocation.
    ///
    /// # Errors
    ///
    /// Fails if the invocation violates a wire limit.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, EncodeError> {
        let mut out = Vec::new();
        self.encode_into(&mut out, 0)?;
        Ok(out)
    }

    /// SHA-256 over [`Self::canonical_bytes`].
    ///
    /// # Errors
    ///
    /// Fails if the invocation violates a wire limit.
    pub fn canonical_hash(&self) -> Result<[u8; 32], EncodeError> {
        Ok(Sha256::digest(self.canonical_bytes()?).into())
    }

    /// Decode a bare invocation from `bytes`, rejecting trailing input.
    ///
    /// This is the inverse of [`Self::canonical_bytes`]; execution backends
    /// receive invocations in this form when simulating a challenge.
    ///
    /// # Errors
    ///
    /// Any malformation.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = Reader::new(bytes);
        let invocation = Self::decode_at(&mut reader, 0)?;
        if reader.remaining() != 0 {
            return Err(DecodeError::TrailingBytes(reader.remaining()));
        }
        Ok(invocation)
    }

    fn encode_into(&self, out: &mut Vec<u8>, depth: usize) -> Result<(), EncodeError> {
        if depth >= MAX_INVOCATION_DEPTH {
            return Err(EncodeError::TooDeep(MAX_INVOCATION_DEPTH));
        }
        encode_address(&self.contract, out);

        if self.function.is_empty()
            || self.function.len() > MAX_FUNCTION_LEN
            || !self.function.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
        {
            return Err(EncodeError::InvalidSymbol);
        }
        out.push(self.function.len() as u8);
        out.extend_from_slice(self.function.as_bytes());

        if self.args.len() > MAX_ARGS {
            return Err(EncodeError::TooMany {
                field: "args",
                max: MAX_ARGS,
                actual: self.args.len(),
            });
        }
        out.extend_from_slice(&(self.args.len() as u32).to_be_bytes());
        for arg in &self.args {
            arg.encode_into(out, 0)?;
        }

        if self.sub_invocations.len() > MAX_SUB_INVOCATIONS {
            return Err(EncodeError::TooMany {
                field: "sub_invocations",
                max: MAX_SUB_INVOCATIONS,
                actual: self.sub_invocations.len(),
            });
        }
        out.extend_from_slice(&(self.sub_invocations.len() as u32).to_be_bytes());
        for sub in &self.sub_invocations {
            sub.encode_into(out, depth + 1)?;
        }
        Ok(())
    }

    fn decode_at(reader: &mut Reader<'_>, depth: usize) -> Result<Self, DecodeError> {
        if depth >= MAX_INVOCATION_DEPTH {
            return Err(DecodeError::TooDeep(MAX_INVOCATION_DEPTH));
        }
        let contract = decode_address(reader)?;

        let fn_len = reader.read_u8()? as usize;
        if fn_len == 0 || fn_len > MAX_FUNCTION_LEN {
            return Err(DecodeError::FieldTooLong {
                field: "function",
                max: MAX_FUNCTION_LEN,
                actual: fn_len,
            });
        }
        let fn_bytes = reader.read_bytes(fn_len)?;
        if !fn_bytes.iter().all(|b| b.is_ascii_alphanumeric() || *b == b'_') {
            return Err(DecodeError::InvalidSymbol);
        }
        let function = std::str::from_utf8(fn_bytes)
            .map_err(|_| DecodeError::InvalidUtf8("function"))?
            .to_string();

        let arg_count = reader.read_count("args", MAX_ARGS)?;
        let mut args = Vec::with_capacity(arg_count);
        for _ in 0..arg_count {
            args.push(Value::decode_at(reader, 0)?);
        }

        let sub_count = reader.read_count("sub_invocations", MAX_SUB_INVOCATIONS)?;
        let mut sub_invocations = Vec::with_capacity(sub_count);
        for _ in 0..sub_count {
            sub_invocations.push(Invocation::decode_at(reader, depth + 1)?);
        }

        Ok(Invocation { contract, function, args, sub_invocations })
    }
}

/// Credentials plus the invocation they authorize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationEntry {
    pub credentials: Credentials,
    pub invocation: Invocation,
}

impl AuthorizationEntry {
    /// Build an unsigned address-credential entry: empty signature,
    /// `valid_until` 0, to be filled in by the signer.
    #[must_use]
    pub fn unsigned(address: Address, invocation: Invocation) -> Self {
        AuthorizationEntry {
            credentials: Credentials::Address {
                address,
                valid_until: 0,
                signature: Vec::new(),
            },
            invocation,
        }
    }

    /// Encode this entry to a fresh buffer.
    ///
    /// # Errors
    ///
    /// Fails if any piece violates a wire limit.
    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        let mut out = Vec::new();
        self.encode_into(&mut out)?;
        Ok(out)
    }

    pub(crate) fn encode_into(&self, out: &mut Vec<u8>) -> Result<(), EncodeError> {
        out.push(ENTRY_VERSION);
        match &self.credentials {
            Credentials::SourceAccount => out.push(CRED_SOURCE),
            Credentials::Address { address, valid_until, signature } => {
                if signature.len() > MAX_SIGNATURE_LEN {
                    return Err(EncodeError::FieldTooLong {
                        field: "signature",
                        max: MAX_SIGNATURE_LEN,
                        actual: signature.len(),
                    });
                }
                out.push(CRED_ADDRESS);
                encode_address(address, out);
                out.extend_from_slice(&valid_until.to_be_bytes());
                out.extend_from_slice(&(signature.len() as u32).to_be_bytes());
                out.extend_from_slice(signature);
            }
        }
        self.invocation.encode_into(out, 0)
    }

    /// Decode a single entry from `bytes`, rejecting trailing input.
    ///
    /// # Errors
    ///
    /// Any malformation, including an unsupported version byte.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = Reader::new(bytes);
        let entry = Self::decode_from(&mut reader)?;
        if reader.remaining() != 0 {
            return Err(DecodeError::TrailingBytes(reader.remaining()));
        }
        Ok(entry)
    }

    pub(crate) fn decode_from(reader: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let version = reader.read_u8()?;
        if version != ENTRY_VERSION {
            return Err(DecodeError::UnsupportedVersion(version));
        }
        let credentials = match reader.read_u8()? {
            CRED_SOURCE => Credentials::SourceAccount,
            CRED_ADDRESS => {
                let address = decode_address(reader)?;
                let valid_until = reader.read_i64()?;
                let sig_len = reader.read_u32()? as usize;
                if sig_len > MAX_SIGNATURE_LEN {
                    return Err(DecodeError::FieldTooLong {
                        field: "signature",
                        max: MAX_SIGNATURE_LEN,
                        actual: sig_len,
                    });
                }
                let signature = reader.read_bytes(sig_len)?.to_vec();
                Credentials::Address { address, valid_until, signature }
            }
            other => return Err(DecodeError::UnknownCredentialsKind(other)),
        };
        let invocation = Invocation::decode_at(reader, 0)?;
        Ok(AuthorizationEntry { credentials, invocation })
    }
}

fn encode_address(address: &Address, out: &mut Vec<u8>) {
    match address {
        Address::Account(key) => {
            out.push(ADDR_ACCOUNT);
            out.extend_from_slice(key);
        }
        Address::Contract(key) => {
            out.push(ADDR_CONTRACT);
            out.extend_from_slice(key);
        }
    }
}

fn decode_address(reader: &mut Reader<'_>) -> Result<Address, DecodeError> {
    let kind = reader.read_u8()?;
    let mut key = [0u8; 32];
    key.copy_from_slice(reader.read_bytes(32)?);
    match kind {
        ADDR_ACCOUNT => Ok(Address::Account(key)),
        ADDR_CONTRACT => Ok(Address::Contract(key)),
        other => Err(DecodeError::UnknownAddressKind(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn webauth_invocation() -> Invocation {
        Invocation {
            contract: Address::Contract([0xc0; 32]),
            function: "web_auth_verify".to_string(),
            args: vec![Value::Map(vec![
                (Value::symbol("account"), Value::string("GAAA")),
                (Value::symbol("nonce"), Value::string("42")),
            ])],
            sub_invocations: Vec::new(),
        }
    }

    #[test]
    fn test_unsigned_entry_roundtrip() {
        let entry = AuthorizationEntry::unsigned(Address::Account([1u8; 32]), webauth_invocation());
        let bytes = entry.encode().unwrap();

        let decoded = AuthorizationEntry::decode(&bytes).unwrap();
        assert_eq!(decoded, entry);
        assert_eq!(decoded.credentials.signature(), Some(&[][..]));
    }

    #[test]
    fn test_signed_entry_roundtrip() {
        let entry = AuthorizationEntry {
            credentials: Credentials::Address {
                address: Address::Account([2u8; 32]),
                valid_until: 1_900_000_000,
                signature: vec![0xab; 64],
            },
            invocation: webauth_invocation(),
        };
        let bytes = entry.encode().unwrap();
        assert_eq!(AuthorizationEntry::decode(&bytes).unwrap(), entry);
    }

    #[test]
    fn test_source_account_entry_roundtrip() {
        let entry = AuthorizationEntry {
            credentials: Credentials::SourceAccount,
            invocation: webauth_invocation(),
        };
        let bytes = entry.encode().unwrap();

        let decoded = AuthorizationEntry::decode(&bytes).unwrap();
        assert_eq!(decoded.credentials.address(), None);
        assert_eq!(decoded.credentials.signature(), None);
    }

    #[test]
    fn test_sub_invocations_roundtrip() {
        let mut invocation = webauth_invocation();
        invocation.sub_invocations.push(Invocation {
            contract: Address::Contract([0xc1; 32]),
            function: "inner".to_string(),
            args: Vec::new(),
            sub_invocations: Vec::new(),
        });
        let entry = AuthorizationEntry::unsigned(Address::Account([3u8; 32]), invocation);

        let decoded = AuthorizationEntry::decode(&entry.encode().unwrap()).unwrap();
        assert_eq!(decoded.invocation.sub_invocations.len(), 1);
        assert_eq!(decoded.invocation.sub_invocations[0].function, "inner");
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let mut bytes = AuthorizationEntry::unsigned(Address::Account([4u8; 32]), webauth_invocation())
            .encode()
            .unwrap();
        bytes[0] = 2;
        assert_eq!(
            AuthorizationEntry::decode(&bytes),
            Err(DecodeError::UnsupportedVersion(2))
        );
    }

    #[test]
    fn test_unknown_credentials_kind_rejected() {
        let mut bytes = AuthorizationEntry::unsigned(Address::Account([5u8; 32]), webauth_invocation())
            .encode()
            .unwrap();
        bytes[1] = 0x09;
        assert_eq!(
            AuthorizationEntry::decode(&bytes),
            Err(DecodeError::UnknownCredentialsKind(0x09))
        );
    }

    #[test]
    fn test_unknown_address_kind_rejected() {
        let mut bytes = AuthorizationEntry::unsigned(Address::Account([6u8; 32]), webauth_invocation())
            .encode()
            .unwrap();
        // Byte 2 is the credential address kind.
        bytes[2] = 0x04;
        assert_eq!(
            AuthorizationEntry::decode(&bytes),
            Err(DecodeError::UnknownAddressKind(0x04))
        );
    }

    #[test]
    fn test_truncated_entry_rejected() {
        let bytes = AuthorizationEntry::unsigned(Address::Account([7u8; 32]), webauth_invocation())
            .encode()
            .unwrap();
        assert_eq!(
            AuthorizationEntry::decode(&bytes[..bytes.len() - 3]),
            Err(DecodeError::Truncated)
        );
    }

    #[test]
    fn test_oversized_signature_rejected() {
        let entry = AuthorizationEntry {
            credentials: Credentials::Address {
                address: Address::Account([8u8; 32]),
                valid_until: 0,
                signature: vec![0u8; MAX_SIGNATURE_LEN + 1],
            },
            invocation: webauth_invocation(),
        };
        assert!(matches!(
            entry.encode(),
            Err(EncodeError::FieldTooLong { field: "signature", .. })
        ));
    }

    #[test]
    fn test_canonical_bytes_ignore_credentials() {
        let invocation = webauth_invocation();
        let unsigned = AuthorizationEntry::unsigned(Address::Account([1u8; 32]), invocation.clone());
        let signed = AuthorizationEntry {
            credentials: Credentials::Address {
                address: Address::Account([2u8; 32]),
                valid_until: 99,
                signature: vec![1, 2, 3],
            },
            invocation,
        };

        assert_eq!(
            unsigned.invocation.canonical_bytes().unwrap(),
            signed.invocation.canonical_bytes().unwrap()
        );
        assert_eq!(
            unsigned.invocation.canonical_hash().unwrap(),
            signed.invocation.canonical_hash().unwrap()
        );
    }

    #[test]
    fn test_canonical_hash_differs_across_invocations() {
        let base = webauth_invocation();
        let mut other = base.clone();
        other.function = "other_function".to_string();

        assert_ne!(base.canonical_hash().unwrap(), other.canonical_hash().unwrap());
    }

    #[test]
    fn test_bare_invocation_roundtrip() {
        let invocation = webauth_invocation();
        let bytes = invocation.canonical_bytes().unwrap();

        assert_eq!(Invocation::decode(&bytes).unwrap(), invocation);
        assert_eq!(
            Invocation::decode(&bytes[..bytes.len() - 1]),
            Err(DecodeError::Truncated)
        );
    }

    #[test]
    fn test_empty_function_name_rejected() {
        let mut invocation = webauth_invocation();
        invocation.function = String::new();
        let entry = AuthorizationEntry::unsigned(Address::Account([9u8; 32]), invocation);
        assert_eq!(entry.encode(), Err(EncodeError::InvalidSymbol));
    }
}
