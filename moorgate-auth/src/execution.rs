//! Execution environment seam.
//!
//! The execution environment is the only component that understands the
//! deployed contract's authorization policy. Issuance asks it which
//! entries an invocation requires; validation hands it the fully signed
//! set and lets it enforce every signature. This crate never inspects
//! signature bytes itself.

use async_trait::async_trait;

use moorgate_wire::{AuthorizationEntry, Invocation};

/// The execution environment failed or refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ExecutionError {
    /// The environment ran the invocation and refused the entries.
    /// During validation this is an authentication failure, not an
    /// outage.
    #[error("execution rejected: {0}")]
    Rejected(String),

    /// The environment could not be reached or gave an unusable answer.
    #[error("execution unavailable: {0}")]
    Unavailable(String),
}

/// Access to the execution environment the web auth contract lives on.
#[async_trait]
pub trait ExecutionClient: Send + Sync {
    /// Simulates `invocation` and returns the authorization entries it
    /// requires, unsigned.
    async fn required_entries(
        &self,
        invocation: &Invocation,
    ) -> Result<Vec<AuthorizationEntry>, ExecutionError>;

    /// Re-runs the invocation with `entries` attached and signature
    /// enforcement on. `Ok(())` means every entry's signature satisfied
    /// its address, with no other authority available.
    async fn enforce(&self, entries: &[AuthorizationEntry]) -> Result<(), ExecutionError>;
}
