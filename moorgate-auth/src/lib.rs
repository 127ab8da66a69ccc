//! Challenge-response authentication logic for Moorgate.
//!
//! This crate is intentionally IO-free:
//! - No filesystem operations
//! - No network calls
//! - No database interactions
//! - No logging
//!
//! Collaborators are injected via traits, and the current time is always
//! an explicit parameter:
//! - [`NonceStore`] - single-use nonce issuance and atomic consumption
//! - [`DomainDiscovery`] - client domain to signing address resolution
//! - [`ExecutionClient`] - simulation and enforcement on the execution
//!   environment the web auth contract lives on
//!
//! # Example
//!
//! ```ignore
//! use moorgate_auth::{build_challenge, validate_challenge, ChallengeRequest};
//!
//! // Issue: assemble and server-sign a challenge for the account.
//! let challenge = build_challenge(&ctx, &request, now, &nonces, &discovery, &execution).await?;
//!
//! // The client signs its entries off-band, then submits them back.
//! let verified = validate_challenge(&ctx, &entries, &nonces, &execution).await?;
//! let token = signer.issue(ctx.web_auth_domain(), &verified, now)?;
//! ```

pub mod args;
pub mod challenge;
pub mod context;
pub mod discovery;
pub mod error;
pub mod execution;
pub mod keys;
pub mod nonce;
pub mod token;

pub use args::{ArgsError, ChallengeArguments};
pub use challenge::{
    build_challenge, entry_signature_payload, validate_challenge, Challenge, ChallengeRequest,
    VerifiedChallenge, WEB_AUTH_VERIFY,
};
pub use context::ServerContext;
pub use discovery::{DiscoveryError, DomainDiscovery};
pub use error::{AuthError, RequestError, SystemError, ValidationError};
pub use execution::{ExecutionClient, ExecutionError};
pub use keys::{KeyError, SigningKey};
pub use nonce::{generate_nonce, MemoryNonceStore, NonceStore, NonceStoreError, NONCE_TTL};
pub use token::{Claims, TokenError, TokenSigner};
