//! Error taxonomy for the authentication flow.
//!
//! Three kinds, kept strictly apart:
//! - [`RequestError`] - the caller's input was unusable before any work
//!   happened; no collaborator was contacted.
//! - [`ValidationError`] - a well-formed signed challenge failed a pipeline
//!   step. The variant names the exact step for operators; the public
//!   surface collapses all of these to one code so callers cannot probe
//!   the pipeline.
//! - [`SystemError`] - a collaborator or resource failed. Never reported
//!   as a failed authentication attempt.

use moorgate_wire::{Address, AddressError, DecodeError, EncodeError};

use crate::args::ArgsError;
use crate::discovery::DiscoveryError;
use crate::nonce::NonceStoreError;
use crate::token::TokenError;

/// Top-level error for challenge issuance and validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum AuthError {
    /// The request was rejected before any work happened.
    #[error("invalid request: {0}")]
    Request(#[from] RequestError),

    /// The signed challenge failed validation.
    #[error("authentication failed: {0}")]
    Validation(#[from] ValidationError),

    /// A collaborator or resource failed.
    #[error("system failure: {0}")]
    System(#[from] SystemError),
}

impl AuthError {
    /// The public error code for this kind.
    ///
    /// Validation failures all map to one code; the specific reason stays
    /// in the typed error for logs.
    #[must_use]
    pub fn public_code(&self) -> &'static str {
        match self {
            AuthError::Request(_) => "invalid_request",
            AuthError::Validation(_) => "authentication_failed",
            AuthError::System(_) => "internal_error",
        }
    }

    /// The public description for this error.
    ///
    /// Request errors describe themselves (the caller needs to know which
    /// parameter was wrong); the other kinds return a fixed text.
    #[must_use]
    pub fn public_description(&self) -> String {
        match self {
            AuthError::Request(e) => e.to_string(),
            AuthError::Validation(_) => "challenge validation failed".to_string(),
            AuthError::System(_) => "internal server error".to_string(),
        }
    }
}

/// The caller's input was unusable. Reported immediately; nothing external
/// was contacted and no nonce was issued or consumed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum RequestError {
    /// A required parameter is missing or empty.
    #[error("missing required parameter {0}")]
    MissingParameter(&'static str),

    /// The account parameter does not parse as an address.
    #[error("account is not a valid address: {0}")]
    InvalidAccount(#[source] AddressError),

    /// The home domain is not one this server serves.
    #[error("home domain {0:?} is not served here")]
    UnknownHomeDomain(String),

    /// The submitted entries could not be decoded at all.
    #[error("malformed authorization entries: {0}")]
    MalformedEntries(#[from] DecodeError),
}

/// A pipeline step rejected the signed challenge. Variants are ordered to
/// match the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ValidationError {
    /// The challenge carries no entries.
    #[error("challenge contains no entries")]
    EmptyChallenge,

    /// An entry's invocation has sub-invocations.
    #[error("entry {index} carries sub-invocations")]
    HasSubInvocations { index: usize },

    /// The entry count does not match what the arguments imply.
    #[error("expected {expected} entries, got {actual}")]
    WrongEntryCount { expected: usize, actual: usize },

    /// An entry's argument map is structurally unusable.
    #[error("entry {index} arguments malformed: {reason}")]
    MalformedArguments { index: usize, reason: ArgsError },

    /// An entry's decoded arguments differ from entry 0's.
    #[error("entry {index} arguments differ from entry 0")]
    InconsistentArguments { index: usize },

    /// The invoked contract is not the deployed web auth contract.
    #[error("invoked contract {actual} is not the web auth contract {expected}")]
    WrongContract { expected: Address, actual: Address },

    /// The invoked function is not the designated verification function.
    #[error("invoked function {actual:?} is not {expected:?}")]
    WrongFunction { expected: &'static str, actual: String },

    /// The web_auth_domain argument names a different server.
    #[error("web_auth_domain {actual:?} does not match {expected:?}")]
    WrongWebAuthDomain { expected: String, actual: String },

    /// The web_auth_domain_account argument is not this server's address.
    #[error("web_auth_domain_account {actual:?} is not the server address")]
    WrongServerAccount { actual: String },

    /// The account argument does not parse as an address.
    #[error("account argument is not a valid address: {0}")]
    InvalidAccountArgument(#[source] AddressError),

    /// The client_domain_account argument does not parse as an address.
    #[error("client_domain_account is not a valid address: {0}")]
    InvalidClientDomainAccount(#[source] AddressError),

    /// No entry is signed by the server's address.
    #[error("server signature missing from challenge")]
    ServerSignatureMissing,

    /// More than one entry is signed by the server's address.
    #[error("multiple server-signed entries in challenge")]
    DuplicateServerSignature,

    /// No entry authorizes the claimed account.
    #[error("no entry authorizes the requested account")]
    AccountEntryMissing,

    /// No entry authorizes the client domain's account.
    #[error("no entry authorizes the client domain account")]
    ClientDomainEntryMissing,

    /// The nonce was absent, expired, or already consumed.
    #[error("nonce replayed or unknown")]
    NonceReplayed,

    /// Enforcing execution refused the assembled entries.
    #[error("execution rejected the challenge: {0}")]
    ExecutionRejected(String),
}

/// A collaborator or resource failed while handling the request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum SystemError {
    /// Domain discovery failed.
    #[error("domain discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    /// The nonce store could not be used.
    #[error("nonce store failure: {0}")]
    NonceStore(#[from] NonceStoreError),

    /// The execution collaborator could not be used, or returned an
    /// unusable entry set at build time.
    #[error("execution collaborator failure: {0}")]
    Execution(String),

    /// Locally assembled structures violated a wire limit.
    #[error("entry encoding failed: {0}")]
    Encode(#[from] EncodeError),

    /// Token issuance failed.
    #[error("token issuance failed: {0}")]
    Token(#[from] TokenError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_codes_are_distinct_per_kind() {
        let request = AuthError::Request(RequestError::MissingParameter("account"));
        let validation = AuthError::Validation(ValidationError::EmptyChallenge);
        let system = AuthError::System(SystemError::Execution("down".to_string()));

        assert_eq!(request.public_code(), "invalid_request");
        assert_eq!(validation.public_code(), "authentication_failed");
        assert_eq!(system.public_code(), "internal_error");
    }

    #[test]
    fn test_request_errors_describe_themselves() {
        let err = AuthError::Request(RequestError::MissingParameter("home_domain"));
        assert!(err.public_description().contains("home_domain"));
    }

    #[test]
    fn test_validation_detail_stays_internal() {
        let err = AuthError::Validation(ValidationError::NonceReplayed);

        // The internal display names the reason; the public text does not.
        assert!(err.to_string().contains("nonce"));
        assert!(!err.public_description().contains("nonce"));
    }

    #[test]
    fn test_system_errors_are_not_authentication_failures() {
        let err = AuthError::System(SystemError::Execution("timeout".to_string()));
        assert_ne!(err.public_code(), "authentication_failed");
        assert!(!err.public_description().contains("timeout"));
    }
}
