//! Client domain discovery seam.
//!
//! When a client asks to bind its own domain into a challenge, the
//! issuing server resolves that domain to the signing address it
//! publishes. The lookup itself (HTTP, caching, timeouts) lives with the
//! caller; this crate only consumes the result.

use async_trait::async_trait;

use moorgate_wire::Address;

/// Resolving a domain to its published signing address failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum DiscoveryError {
    /// The domain's metadata could not be fetched.
    #[error("could not fetch metadata for {domain:?}: {reason}")]
    Fetch { domain: String, reason: String },

    /// The metadata was fetched but declares no signing key.
    #[error("{domain:?} publishes no signing key")]
    MissingSigningKey { domain: String },

    /// The declared signing key is not a valid account address.
    #[error("{domain:?} publishes an unusable signing key")]
    InvalidSigningKey { domain: String },
}

/// Resolves a domain name to the account address it signs with.
#[async_trait]
pub trait DomainDiscovery: Send + Sync {
    /// Looks up the signing address published by `domain`.
    async fn signing_address(&self, domain: &str) -> Result<Address, DiscoveryError>;
}
