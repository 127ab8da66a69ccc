//! Wire types for Moorgate web authentication.
//!
//! This crate defines the binary shapes exchanged between the server and
//! signing clients:
//! - [`address`] - self-checking text form for account and contract addresses
//! - [`value`] - structured argument values (symbols, strings, maps)
//! - [`entry`] - authorization entries: credentials plus an invocation tree
//! - [`frame`] - the transport frame carrying an entry sequence as base64
//!
//! All encoding is deterministic: the same structure always produces the
//! same bytes, so hashes over canonical bytes are stable. Decoding is
//! bounds-checked and capped everywhere; every input reaching this crate is
//! untrusted.
//!
//! No IO, no async, no logging. The validation logic that consumes these
//! types lives in `moorgate-auth`.

pub mod address;
mod codec;
pub mod entry;
pub mod frame;
pub mod value;

pub use address::{Address, AddressError};
pub use codec::{DecodeError, EncodeError};
pub use entry::{AuthorizationEntry, Credentials, Invocation};
pub use frame::{decode_entries, encode_entries, entries_from_base64, entries_to_base64};
pub use value::Value;
