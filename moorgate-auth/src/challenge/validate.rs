//! The challenge validation pipeline.

use moorgate_wire::{Address, AuthorizationEntry};

use crate::args::{self, ChallengeArguments};
use crate::context::ServerContext;
use crate::error::{AuthError, SystemError, ValidationError};
use crate::execution::{ExecutionClient, ExecutionError};
use crate::nonce::NonceStore;

use super::WEB_AUTH_VERIFY;

/// Result of a successfully validated challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedChallenge {
    args: ChallengeArguments,
    invocation_hash: [u8; 32],
}

impl VerifiedChallenge {
    /// Crate-private so a `VerifiedChallenge` only ever comes out of
    /// [`validate_challenge`].
    #[must_use]
    pub(crate) fn new(args: ChallengeArguments, invocation_hash: [u8; 32]) -> Self {
        Self {
            args,
            invocation_hash,
        }
    }

    /// The argument map shared by every entry of the challenge.
    #[must_use]
    pub fn arguments(&self) -> &ChallengeArguments {
        &self.args
    }

    /// Hash of the canonical invocation bytes; the token id derives from it.
    #[must_use]
    pub fn invocation_hash(&self) -> &[u8; 32] {
        &self.invocation_hash
    }
}

/// Validates a signed challenge.
///
/// Steps run in a fixed order, cheapest first:
///
/// 1. at least one entry
/// 2. no sub-invocations anywhere
/// 3. entry count matches what entry 0's argument map implies
/// 4. every entry decodes to entry 0's argument map
/// 5. every entry invokes the web auth contract
/// 6. every entry invokes the verification function
/// 7. the argument map itself is valid and names this server
/// 8. exactly one server-signed entry, and each expected participant is
///    covered by an entry (entries without an address are skipped)
/// 9. the nonce is consumed, here and only here
/// 10. the execution environment enforces every signature
///
/// A challenge rejected before step 9 keeps its nonce. From step 9 on
/// the nonce is burned whatever the outcome; there are no retries.
///
/// # Errors
///
/// [`ValidationError`] names the failing step; [`SystemError`] means a
/// collaborator failed and says nothing about the challenge.
pub async fn validate_challenge(
    ctx: &ServerContext,
    entries: &[AuthorizationEntry],
    nonces: &dyn NonceStore,
    execution: &dyn ExecutionClient,
) -> Result<VerifiedChallenge, AuthError> {
    // Shape: non-empty, no sub-invocations.
    if entries.is_empty() {
        return Err(ValidationError::EmptyChallenge.into());
    }
    for (index, entry) in entries.iter().enumerate() {
        if !entry.invocation.sub_invocations.is_empty() {
            return Err(ValidationError::HasSubInvocations { index }.into());
        }
    }

    // Cardinality: entry 0's argument map decides the expected count.
    let base_pairs = args::argument_map(&entries[0].invocation)
        .map_err(|reason| ValidationError::MalformedArguments { index: 0, reason })?;
    let expects_client_domain = base_pairs
        .iter()
        .any(|(key, _)| key.as_symbol() == Some(args::KEY_CLIENT_DOMAIN));
    let expected = if expects_client_domain { 3 } else { 2 };
    if entries.len() != expected {
        return Err(ValidationError::WrongEntryCount {
            expected,
            actual: entries.len(),
        }
        .into());
    }

    // Consistency: every other entry decodes to the same map.
    for (index, entry) in entries.iter().enumerate().skip(1) {
        let pairs = args::argument_map(&entry.invocation)
            .map_err(|reason| ValidationError::MalformedArguments { index, reason })?;
        if pairs != base_pairs {
            return Err(ValidationError::InconsistentArguments { index }.into());
        }
    }

    // Identity: the deployed contract, then the designated function.
    for entry in entries {
        if entry.invocation.contract != *ctx.web_auth_contract() {
            return Err(ValidationError::WrongContract {
                expected: *ctx.web_auth_contract(),
                actual: entry.invocation.contract,
            }
            .into());
        }
    }
    for entry in entries {
        if entry.invocation.function != WEB_AUTH_VERIFY {
            return Err(ValidationError::WrongFunction {
                expected: WEB_AUTH_VERIFY,
                actual: entry.invocation.function.clone(),
            }
            .into());
        }
    }

    // Arguments: full strict decode, then the fields naming this server.
    let parsed = ChallengeArguments::from_invocation(&entries[0].invocation)
        .map_err(|reason| ValidationError::MalformedArguments { index: 0, reason })?;
    if parsed.web_auth_domain != ctx.web_auth_domain() {
        return Err(ValidationError::WrongWebAuthDomain {
            expected: ctx.web_auth_domain().to_string(),
            actual: parsed.web_auth_domain.clone(),
        }
        .into());
    }
    if parsed.web_auth_domain_account != ctx.server_address().to_string() {
        return Err(ValidationError::WrongServerAccount {
            actual: parsed.web_auth_domain_account.clone(),
        }
        .into());
    }
    let account: Address = parsed
        .account
        .parse()
        .map_err(ValidationError::InvalidAccountArgument)?;
    let client_domain_account: Option<Address> = match &parsed.client_domain_account {
        Some(s) => Some(
            s.parse()
                .map_err(ValidationError::InvalidClientDomainAccount)?,
        ),
        None => None,
    };

    // Signer coverage. Signature bytes are not interpreted here; that is
    // the execution environment's job at the final step.
    let mut server_signatures = 0usize;
    let mut account_covered = false;
    let mut client_domain_covered = false;
    for entry in entries {
        let Some(address) = entry.credentials.address() else {
            continue;
        };
        if *address == *ctx.server_address()
            && entry.credentials.signature().is_some_and(|s| !s.is_empty())
        {
            server_signatures += 1;
        }
        if *address == account {
            account_covered = true;
        }
        if client_domain_account.as_ref() == Some(address) {
            client_domain_covered = true;
        }
    }
    match server_signatures {
        0 => return Err(ValidationError::ServerSignatureMissing.into()),
        1 => {}
        _ => return Err(ValidationError::DuplicateServerSignature.into()),
    }
    if !account_covered {
        return Err(ValidationError::AccountEntryMissing.into());
    }
    if expects_client_domain && !client_domain_covered {
        return Err(ValidationError::ClientDomainEntryMissing.into());
    }

    // The nonce burns here and nowhere else.
    if !nonces
        .consume(&parsed.account, &parsed.nonce)
        .await
        .map_err(SystemError::from)?
    {
        return Err(ValidationError::NonceReplayed.into());
    }

    // Enforcement: the execution environment is the sole signature
    // authority. A rejection here does not refund the nonce.
    if let Err(err) = execution.enforce(entries).await {
        return Err(match err {
            ExecutionError::Rejected(reason) => {
                ValidationError::ExecutionRejected(reason).into()
            }
            other => SystemError::Execution(other.to_string()).into(),
        });
    }

    let invocation_hash = entries[0]
        .invocation
        .canonical_hash()
        .map_err(SystemError::from)?;
    Ok(VerifiedChallenge::new(parsed, invocation_hash))
}
