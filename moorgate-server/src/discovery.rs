//! Signing key discovery for client domains.
//!
//! A domain that wants its identity bound into challenges publishes the
//! address it signs with in a TOML document at a well-known location:
//!
//! ```text
//! GET https://<domain>/.well-known/webauth.toml
//!
//! SIGNING_KEY = "GB3D..."
//! ```
//!
//! The document is fetched fresh on every challenge; a domain rotating its
//! key must not be pinned to the old one.

use std::time::Duration;

use async_trait::async_trait;
use moorgate_auth::{DiscoveryError, DomainDiscovery};
use moorgate_wire::Address;
use serde::Deserialize;

const WELL_KNOWN_PATH: &str = "/.well-known/webauth.toml";
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Deserialize)]
struct WellKnown {
    #[serde(rename = "SIGNING_KEY")]
    signing_key: Option<String>,
}

/// Discovery client that fetches well-known documents over HTTP.
#[derive(Clone)]
pub struct HttpDiscovery {
    client: reqwest::Client,
    scheme: &'static str,
}

impl HttpDiscovery {
    /// Production client, fetching over https.
    ///
    /// # Errors
    ///
    /// The underlying HTTP client cannot be built.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_scheme("https")
    }

    /// Client on a fixed scheme. Plain `http` only makes sense against
    /// local stub servers.
    ///
    /// # Errors
    ///
    /// The underlying HTTP client cannot be built.
    pub fn with_scheme(scheme: &'static str) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(FETCH_TIMEOUT).build()?;
        Ok(Self { client, scheme })
    }
}

#[async_trait]
impl DomainDiscovery for HttpDiscovery {
    async fn signing_address(&self, domain: &str) -> Result<Address, DiscoveryError> {
        let url = format!("{}://{domain}{WELL_KNOWN_PATH}", self.scheme);

        let response = self.client.get(&url).send().await.map_err(|e| {
            DiscoveryError::Fetch {
                domain: domain.to_string(),
                reason: e.to_string(),
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DiscoveryError::Fetch {
                domain: domain.to_string(),
                reason: format!("status {status}"),
            });
        }

        let body = response.text().await.map_err(|e| DiscoveryError::Fetch {
            domain: domain.to_string(),
            reason: e.to_string(),
        })?;

        let document: WellKnown = toml::from_str(&body).map_err(|e| DiscoveryError::Fetch {
            domain: domain.to_string(),
            reason: format!("invalid well-known document: {e}"),
        })?;

        let signing_key = document
            .signing_key
            .ok_or_else(|| DiscoveryError::MissingSigningKey {
                domain: domain.to_string(),
            })?;

        signing_key
            .parse()
            .map_err(|_| DiscoveryError::InvalidSigningKey {
                domain: domain.to_string(),
            })
    }
}
