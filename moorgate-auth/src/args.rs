//! Challenge argument encoding and decoding.
//!
//! Every authorization entry in a challenge invokes the web auth
//! function with a single map argument. This module owns that map's
//! shape: which keys exist, which are required, and how the typed
//! [`ChallengeArguments`] move to and from wire values.
//!
//! Encoding writes keys in lexicographic order, so two equal argument
//! sets always produce identical bytes.

use moorgate_wire::{Invocation, Value};

/// Map key for the account being authenticated.
pub const KEY_ACCOUNT: &str = "account";
/// Map key for the client's own domain, present only when requested.
pub const KEY_CLIENT_DOMAIN: &str = "client_domain";
/// Map key for the client domain's signing address.
pub const KEY_CLIENT_DOMAIN_ACCOUNT: &str = "client_domain_account";
/// Map key for the service the client wants to reach.
pub const KEY_HOME_DOMAIN: &str = "home_domain";
/// Map key for the single-use nonce.
pub const KEY_NONCE: &str = "nonce";
/// Map key for the authentication server's domain.
pub const KEY_WEB_AUTH_DOMAIN: &str = "web_auth_domain";
/// Map key for the authentication server's signing address.
pub const KEY_WEB_AUTH_DOMAIN_ACCOUNT: &str = "web_auth_domain_account";

/// The argument map could not be interpreted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ArgsError {
    /// The invocation does not carry exactly one argument.
    #[error("expected exactly one argument, got {0}")]
    WrongArgumentCount(usize),

    /// The single argument is not a map.
    #[error("argument is not a map")]
    NotAMap,

    /// A map key is not a symbol.
    #[error("map key is not a symbol")]
    NonSymbolKey,

    /// A map value is not a string.
    #[error("value for key {0:?} is not a string")]
    NonStringValue(String),

    /// A key appears more than once.
    #[error("duplicate key {0:?}")]
    DuplicateKey(String),

    /// A key outside the defined set appears.
    #[error("unknown key {0:?}")]
    UnknownKey(String),

    /// A required key is absent.
    #[error("missing key {0:?}")]
    MissingKey(&'static str),
}

/// The decoded argument map of a challenge entry.
///
/// `client_domain` and `client_domain_account` travel as a pair: both
/// present or both absent. [`from_invocation`](Self::from_invocation)
/// rejects a lone half.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeArguments {
    pub account: String,
    pub home_domain: String,
    pub web_auth_domain: String,
    pub web_auth_domain_account: String,
    pub nonce: String,
    pub client_domain: Option<String>,
    pub client_domain_account: Option<String>,
}

impl ChallengeArguments {
    /// Whether this challenge binds a client domain.
    #[must_use]
    pub fn has_client_domain(&self) -> bool {
        self.client_domain.is_some()
    }

    /// Encodes the arguments as the single map value entries carry.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut pairs = Vec::with_capacity(7);
        pairs.push((Value::symbol(KEY_ACCOUNT), Value::string(&self.account)));
        if let (Some(domain), Some(account)) =
            (&self.client_domain, &self.client_domain_account)
        {
            pairs.push((Value::symbol(KEY_CLIENT_DOMAIN), Value::string(domain)));
            pairs.push((
                Value::symbol(KEY_CLIENT_DOMAIN_ACCOUNT),
                Value::string(account),
            ));
        }
        pairs.push((
            Value::symbol(KEY_HOME_DOMAIN),
            Value::string(&self.home_domain),
        ));
        pairs.push((Value::symbol(KEY_NONCE), Value::string(&self.nonce)));
        pairs.push((
            Value::symbol(KEY_WEB_AUTH_DOMAIN),
            Value::string(&self.web_auth_domain),
        ));
        pairs.push((
            Value::symbol(KEY_WEB_AUTH_DOMAIN_ACCOUNT),
            Value::string(&self.web_auth_domain_account),
        ));
        Value::Map(pairs)
    }

    /// Decodes and fully checks the argument map of `invocation`.
    ///
    /// Enforces the strict shape: symbol keys, string values, no
    /// duplicates, no unknown keys, all required keys present, and the
    /// client domain pair complete or absent.
    pub fn from_invocation(invocation: &Invocation) -> Result<Self, ArgsError> {
        let pairs = argument_map(invocation)?;

        let mut account = None;
        let mut client_domain = None;
        let mut client_domain_account = None;
        let mut home_domain = None;
        let mut nonce = None;
        let mut web_auth_domain = None;
        let mut web_auth_domain_account = None;

        for (key, value) in pairs {
            let key = key.as_symbol().ok_or(ArgsError::NonSymbolKey)?;
            let value = value
                .as_str()
                .ok_or_else(|| ArgsError::NonStringValue(key.to_string()))?;
            let slot = match key {
                KEY_ACCOUNT => &mut account,
                KEY_CLIENT_DOMAIN => &mut client_domain,
                KEY_CLIENT_DOMAIN_ACCOUNT => &mut client_domain_account,
                KEY_HOME_DOMAIN => &mut home_domain,
                KEY_NONCE => &mut nonce,
                KEY_WEB_AUTH_DOMAIN => &mut web_auth_domain,
                KEY_WEB_AUTH_DOMAIN_ACCOUNT => &mut web_auth_domain_account,
                other => return Err(ArgsError::UnknownKey(other.to_string())),
            };
            if slot.is_some() {
                return Err(ArgsError::DuplicateKey(key.to_string()));
            }
            *slot = Some(value.to_string());
        }

        if client_domain.is_some() && client_domain_account.is_none() {
            return Err(ArgsError::MissingKey(KEY_CLIENT_DOMAIN_ACCOUNT));
        }
        if client_domain.is_none() && client_domain_account.is_some() {
            return Err(ArgsError::MissingKey(KEY_CLIENT_DOMAIN));
        }

        Ok(Self {
            account: account.ok_or(ArgsError::MissingKey(KEY_ACCOUNT))?,
            home_domain: home_domain.ok_or(ArgsError::MissingKey(KEY_HOME_DOMAIN))?,
            web_auth_domain: web_auth_domain
                .ok_or(ArgsError::MissingKey(KEY_WEB_AUTH_DOMAIN))?,
            web_auth_domain_account: web_auth_domain_account
                .ok_or(ArgsError::MissingKey(KEY_WEB_AUTH_DOMAIN_ACCOUNT))?,
            nonce: nonce.ok_or(ArgsError::MissingKey(KEY_NONCE))?,
            client_domain,
            client_domain_account,
        })
    }
}

/// Returns the key-value pairs of an invocation's single map argument.
///
/// This is the structural half of decoding: it checks argument count and
/// shape but nothing about the keys inside. Consistency comparison uses
/// it so that a missing required key is reported by the later full
/// decode, not here.
pub fn argument_map(invocation: &Invocation) -> Result<&[(Value, Value)], ArgsError> {
    match invocation.args.as_slice() {
        [single] => single.as_map().ok_or(ArgsError::NotAMap),
        args => Err(ArgsError::WrongArgumentCount(args.len())),
    }
}
