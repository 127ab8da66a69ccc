//! Challenge assembly.

use moorgate_wire::{Address, AuthorizationEntry, Credentials, Invocation};

use crate::args::ChallengeArguments;
use crate::context::ServerContext;
use crate::discovery::DomainDiscovery;
use crate::error::{AuthError, RequestError, SystemError};
use crate::execution::ExecutionClient;
use crate::nonce::NonceStore;

use super::{entry_signature_payload, Challenge, WEB_AUTH_VERIFY};

/// What a client asks for when requesting a challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeRequest {
    /// Address of the account to authenticate.
    pub account: String,
    /// The service the client ultimately wants a token for.
    pub home_domain: String,
    /// The client's own domain, when it wants that bound into the
    /// challenge. Blank is treated as absent.
    pub client_domain: Option<String>,
}

/// Builds a challenge for `request`.
///
/// Request parameters are checked before anything external is touched: a
/// bad request performs no discovery call and mints no nonce. Entries
/// come from simulating the verification invocation; every entry gets the
/// same validity window, and only the server's own entry is signed here.
///
/// # Errors
///
/// [`RequestError`] for unusable parameters, [`SystemError`] when a
/// collaborator fails or the simulation result is unusable.
pub async fn build_challenge(
    ctx: &ServerContext,
    request: &ChallengeRequest,
    now_unix: i64,
    nonces: &dyn NonceStore,
    discovery: &dyn DomainDiscovery,
    execution: &dyn ExecutionClient,
) -> Result<Challenge, AuthError> {
    if request.account.is_empty() {
        return Err(RequestError::MissingParameter("account").into());
    }
    let account: Address = request
        .account
        .parse()
        .map_err(RequestError::InvalidAccount)?;
    if request.home_domain.is_empty() {
        return Err(RequestError::MissingParameter("home_domain").into());
    }
    if !ctx.serves_home_domain(&request.home_domain) {
        return Err(RequestError::UnknownHomeDomain(request.home_domain.clone()).into());
    }
    let client_domain = request.client_domain.as_deref().filter(|d| !d.is_empty());

    let client_domain_account = match client_domain {
        Some(domain) => Some(
            discovery
                .signing_address(domain)
                .await
                .map_err(SystemError::from)?,
        ),
        None => None,
    };

    let account_str = account.to_string();
    let nonce = nonces
        .issue(&account_str)
        .await
        .map_err(SystemError::from)?;

    let args = ChallengeArguments {
        account: account_str,
        home_domain: request.home_domain.clone(),
        web_auth_domain: ctx.web_auth_domain().to_string(),
        web_auth_domain_account: ctx.server_address().to_string(),
        nonce,
        client_domain: client_domain.map(str::to_string),
        client_domain_account: client_domain_account.map(|a| a.to_string()),
    };
    let invocation = Invocation {
        contract: *ctx.web_auth_contract(),
        function: WEB_AUTH_VERIFY.to_string(),
        args: vec![args.to_value()],
        sub_invocations: vec![],
    };

    let required = execution
        .required_entries(&invocation)
        .await
        .map_err(|e| SystemError::Execution(e.to_string()))?;
    if required.is_empty() {
        return Err(SystemError::Execution("simulation required no entries".to_string()).into());
    }

    let expires_at = now_unix + ctx.challenge_ttl_secs();
    let mut entries = Vec::with_capacity(required.len());
    let mut server_signed = false;
    for entry in required {
        let Some(address) = entry.credentials.address().copied() else {
            return Err(SystemError::Execution(
                "simulation returned an entry without address credentials".to_string(),
            )
            .into());
        };
        // Entries must echo the submitted invocation unchanged; the server
        // never signs material it did not build.
        if entry.invocation != invocation {
            return Err(SystemError::Execution(
                "simulation returned an entry with a different invocation".to_string(),
            )
            .into());
        }
        let signature = if address == *ctx.server_address() {
            if server_signed {
                return Err(SystemError::Execution(
                    "simulation returned multiple server entries".to_string(),
                )
                .into());
            }
            server_signed = true;
            let payload = entry_signature_payload(ctx.network_id(), expires_at, &entry.invocation)
                .map_err(SystemError::from)?;
            ctx.signing_key().sign(&payload).to_vec()
        } else {
            Vec::new()
        };
        entries.push(AuthorizationEntry {
            credentials: Credentials::Address {
                address,
                valid_until: expires_at,
                signature,
            },
            invocation: entry.invocation,
        });
    }
    if !server_signed {
        return Err(SystemError::Execution("simulation returned no server entry".to_string()).into());
    }

    Ok(Challenge {
        entries,
        network_passphrase: ctx.network_passphrase().to_string(),
    })
}
