//! Server-side configuration snapshot used across issuance and validation.

use sha2::{Digest, Sha256};

use moorgate_wire::Address;

use crate::keys::SigningKey;

/// Default lifetime of an issued challenge, in seconds.
///
/// Matches the nonce lifetime so a challenge never outlives its nonce.
pub const DEFAULT_CHALLENGE_TTL_SECS: i64 = 300;

/// Everything the issuance and validation paths need to know about this
/// server. Built once at startup and shared.
///
/// The network identifier and the server's own address are derived in the
/// constructor so per-request paths never recompute them.
pub struct ServerContext {
    network_passphrase: String,
    network_id: [u8; 32],
    web_auth_contract: Address,
    signing_key: SigningKey,
    server_address: Address,
    web_auth_domain: String,
    home_domains: Vec<String>,
    challenge_ttl_secs: i64,
}

impl ServerContext {
    /// Assembles a context.
    ///
    /// `home_domains` lists the domains this server issues challenges for.
    /// An empty list accepts any domain.
    #[must_use]
    pub fn new(
        network_passphrase: impl Into<String>,
        web_auth_contract: Address,
        signing_key: SigningKey,
        web_auth_domain: impl Into<String>,
        home_domains: Vec<String>,
        challenge_ttl_secs: i64,
    ) -> Self {
        let network_passphrase = network_passphrase.into();
        let network_id = Sha256::digest(network_passphrase.as_bytes()).into();
        let server_address = signing_key.address();
        Self {
            network_passphrase,
            network_id,
            web_auth_contract,
            signing_key,
            server_address,
            web_auth_domain: web_auth_domain.into(),
            home_domains,
            challenge_ttl_secs,
        }
    }

    /// The passphrase of the network challenges are bound to.
    #[must_use]
    pub fn network_passphrase(&self) -> &str {
        &self.network_passphrase
    }

    /// The hash of the network passphrase, mixed into entry signature
    /// payloads.
    #[must_use]
    pub fn network_id(&self) -> &[u8; 32] {
        &self.network_id
    }

    /// The deployed web auth contract every challenge must invoke.
    #[must_use]
    pub fn web_auth_contract(&self) -> &Address {
        &self.web_auth_contract
    }

    /// The key this server signs challenge entries with.
    #[must_use]
    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    /// The address of [`Self::signing_key`].
    #[must_use]
    pub fn server_address(&self) -> &Address {
        &self.server_address
    }

    /// The domain name clients authenticate against.
    #[must_use]
    pub fn web_auth_domain(&self) -> &str {
        &self.web_auth_domain
    }

    /// Seconds a freshly built challenge stays valid.
    #[must_use]
    pub fn challenge_ttl_secs(&self) -> i64 {
        self.challenge_ttl_secs
    }

    /// Whether this server issues challenges for `domain`.
    #[must_use]
    pub fn serves_home_domain(&self, domain: &str) -> bool {
        self.home_domains.is_empty() || self.home_domains.iter().any(|d| d == domain)
    }
}
