//! Server signing key.
//!
//! The server holds one Ed25519 key: its public half is the server's
//! account address (the `web_auth_domain_account` of every challenge), and
//! the private half signs the server's own authorization entry at
//! issuance.
//!
//! Secret handling follows the usual rules: no `Debug` implementation,
//! seed access is explicit, and the underlying key zeroizes on drop.

use ed25519_dalek::Signer;
use zeroize::Zeroizing;

use moorgate_wire::Address;

/// Errors from loading a signing key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum KeyError {
    /// The seed is not exactly 32 bytes.
    #[error("invalid seed length: expected 32, got {0}")]
    InvalidSeedLength(usize),
}

/// The server's Ed25519 signing key.
pub struct SigningKey(ed25519_dalek::SigningKey);

// Intentionally no Debug implementation.

impl SigningKey {
    /// Generate a fresh random key.
    #[must_use]
    pub fn generate() -> Self {
        Self(ed25519_dalek::SigningKey::generate(&mut rand::rngs::OsRng))
    }

    /// Load a key from its 32-byte seed.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidSeedLength`] if the slice is not exactly
    /// 32 bytes.
    pub fn from_seed(seed: &[u8]) -> Result<Self, KeyError> {
        let seed: [u8; 32] = seed
            .try_into()
            .map_err(|_| KeyError::InvalidSeedLength(seed.len()))?;
        Ok(Self(ed25519_dalek::SigningKey::from_bytes(&seed)))
    }

    /// Export the raw seed, wrapped so the copy zeroizes on drop.
    #[must_use]
    pub fn to_seed(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.0.to_bytes())
    }

    /// Sign a message.
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.0.sign(message).to_bytes()
    }

    /// The account address derived from this key's public half.
    #[must_use]
    pub fn address(&self) -> Address {
        Address::Account(self.0.verifying_key().to_bytes())
    }

    /// The raw public key bytes.
    #[must_use]
    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.0.verifying_key().to_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::Verifier;

    #[test]
    fn test_seed_roundtrip() {
        let key = SigningKey::generate();
        let seed = key.to_seed();
        let restored = SigningKey::from_seed(seed.as_slice()).unwrap();
        assert_eq!(key.address(), restored.address());
    }

    #[test]
    fn test_invalid_seed_length_rejected() {
        assert_eq!(
            SigningKey::from_seed(&[0u8; 16]).err().unwrap(),
            KeyError::InvalidSeedLength(16)
        );
    }

    #[test]
    fn test_signature_verifies_against_address_key() {
        let key = SigningKey::generate();
        let message = b"challenge payload";
        let signature = key.sign(message);

        let verifying = ed25519_dalek::VerifyingKey::from_bytes(&key.public_key_bytes()).unwrap();
        let signature = ed25519_dalek::Signature::from_bytes(&signature);
        assert!(verifying.verify(message, &signature).is_ok());
    }

    #[test]
    fn test_address_is_account_form() {
        let key = SigningKey::generate();
        assert!(key.address().to_string().starts_with('G'));
    }
}
