//! Challenge issuance and validation.
//!
//! A challenge is a short list of authorization entries that all invoke
//! the web auth contract's verification function with one shared argument
//! map. [`build`] assembles and server-signs the list, the client signs
//! its entries off-band, and [`validate`] runs the returned list through
//! the validation pipeline. A passing challenge yields the material a
//! session token is minted from.

pub mod build;
pub mod validate;

pub use build::{build_challenge, ChallengeRequest};
pub use validate::{validate_challenge, VerifiedChallenge};

use sha2::{Digest, Sha256};

use moorgate_wire::{AuthorizationEntry, EncodeError, Invocation};

/// The contract function every challenge entry invokes.
pub const WEB_AUTH_VERIFY: &str = "web_auth_verify";

/// Domain separation string mixed into every entry signature payload.
const ENTRY_SIGNATURE_DOMAIN: &[u8] = b"webauth-entry-v1";

/// A built challenge, ready to hand to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    /// The entries, with the server's own entry already signed.
    pub entries: Vec<AuthorizationEntry>,
    /// Passphrase of the network the entries are bound to.
    pub network_passphrase: String,
}

impl Challenge {
    /// The framed, base64 form of [`Self::entries`] for transport.
    ///
    /// # Errors
    ///
    /// Fails if the entries violate a wire limit.
    pub fn to_base64(&self) -> Result<String, EncodeError> {
        moorgate_wire::entries_to_base64(&self.entries)
    }
}

/// The 32-byte payload an entry signature covers:
///
/// ```text
/// sha256( network_id || "webauth-entry-v1" || valid_until(i64 be) || canonical invocation bytes )
/// ```
///
/// A signature is bound to one network, one validity window, and one
/// invocation; changing any of the three voids it.
///
/// # Errors
///
/// Fails if the invocation violates a wire limit.
pub fn entry_signature_payload(
    network_id: &[u8; 32],
    valid_until: i64,
    invocation: &Invocation,
) -> Result<[u8; 32], EncodeError> {
    let mut hasher = Sha256::new();
    hasher.update(network_id);
    hasher.update(ENTRY_SIGNATURE_DOMAIN);
    hasher.update(valid_until.to_be_bytes());
    hasher.update(invocation.canonical_bytes()?);
    Ok(hasher.finalize().into())
}
