//! Session token issuance and verification.
//!
//! Tokens are compact JWS strings, `base64url(header).base64url(claims).
//! base64url(mac)`, authenticated with HMAC-SHA256 over the first two
//! segments. The token id is derived from the validated challenge's
//! invocation hash, so one challenge can never yield two token ids.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::challenge::VerifiedChallenge;

type HmacSha256 = Hmac<Sha256>;

/// Minimum length of the signing secret, in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// JOSE header every minted token carries.
const HEADER_JSON: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

/// Token issuance or verification failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum TokenError {
    /// The signing secret is shorter than [`MIN_SECRET_LEN`].
    #[error("signing secret shorter than {MIN_SECRET_LEN} bytes")]
    WeakSecret,

    /// The token is not a well-formed HS256 compact JWS.
    #[error("malformed token")]
    Malformed,

    /// The signature does not match the token body.
    #[error("invalid token signature")]
    InvalidSignature,

    /// The token's validity window has passed.
    #[error("token expired")]
    Expired,

    /// The claim set could not be serialized.
    #[error("claims serialization failed")]
    Serialize,
}

/// The claim set carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// The authentication server's domain.
    pub iss: String,
    /// The authenticated account address.
    pub sub: String,
    /// Issuance time, Unix seconds.
    pub iat: i64,
    /// Expiry time, Unix seconds. The token is invalid from this instant.
    pub exp: i64,
    /// Token id: hex hash of the challenge invocation this token came from.
    pub jti: String,
    /// The service the client authenticated for.
    pub home_domain: String,
    /// The client's own domain, when one was bound into the challenge.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub client_domain: Option<String>,
}

#[derive(Deserialize)]
struct Header {
    alg: String,
}

/// Mints and verifies session tokens with a shared secret.
pub struct TokenSigner {
    secret: Zeroizing<Vec<u8>>,
    ttl_secs: i64,
}

// Intentionally no Debug implementation.

impl TokenSigner {
    /// Creates a signer whose tokens live for `ttl_secs`.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::WeakSecret`] if `secret` is shorter than
    /// [`MIN_SECRET_LEN`] bytes.
    pub fn new(secret: &[u8], ttl_secs: i64) -> Result<Self, TokenError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(TokenError::WeakSecret);
        }
        Ok(Self {
            secret: Zeroizing::new(secret.to_vec()),
            ttl_secs,
        })
    }

    /// Mints a token for a validated challenge.
    ///
    /// `issuer` is the web auth domain the token names as `iss`.
    pub fn issue(
        &self,
        issuer: &str,
        verified: &VerifiedChallenge,
        now_unix: i64,
    ) -> Result<String, TokenError> {
        let args = verified.arguments();
        let claims = Claims {
            iss: issuer.to_string(),
            sub: args.account.clone(),
            iat: now_unix,
            exp: now_unix + self.ttl_secs,
            jti: hex::encode(verified.invocation_hash()),
            home_domain: args.home_domain.clone(),
            client_domain: args.client_domain.clone(),
        };
        self.encode(&claims)
    }

    /// Verifies a token and returns its claims.
    ///
    /// Checks run in a fixed order: shape, then declared algorithm, then
    /// signature, then claims, then expiry. Expiry is judged only after
    /// the signature proves the token is ours.
    pub fn verify(&self, token: &str, now_unix: i64) -> Result<Claims, TokenError> {
        let mut parts = token.split('.');
        let (Some(header_b64), Some(payload_b64), Some(tag_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenError::Malformed);
        };

        let header_bytes = URL_SAFE_NO_PAD
            .decode(header_b64)
            .map_err(|_| TokenError::Malformed)?;
        let header: Header =
            serde_json::from_slice(&header_bytes).map_err(|_| TokenError::Malformed)?;
        if header.alg != "HS256" {
            return Err(TokenError::Malformed);
        }

        // The mac covers the two received segments byte for byte, not a
        // re-serialization of them.
        let signing_input = &token.as_bytes()[..header_b64.len() + 1 + payload_b64.len()];
        let mut mac = self.mac()?;
        mac.update(signing_input);
        let expected = mac.finalize().into_bytes();
        let given = URL_SAFE_NO_PAD
            .decode(tag_b64)
            .map_err(|_| TokenError::Malformed)?;
        if !bool::from(expected.as_slice().ct_eq(given.as_slice())) {
            return Err(TokenError::InvalidSignature);
        }

        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| TokenError::Malformed)?;
        let claims: Claims =
            serde_json::from_slice(&payload).map_err(|_| TokenError::Malformed)?;

        if now_unix >= claims.exp {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }

    fn encode(&self, claims: &Claims) -> Result<String, TokenError> {
        let payload = serde_json::to_vec(claims).map_err(|_| TokenError::Serialize)?;

        let mut token = URL_SAFE_NO_PAD.encode(HEADER_JSON.as_bytes());
        token.push('.');
        token.push_str(&URL_SAFE_NO_PAD.encode(&payload));

        let mut mac = self.mac()?;
        mac.update(token.as_bytes());
        let tag = mac.finalize().into_bytes();

        token.push('.');
        token.push_str(&URL_SAFE_NO_PAD.encode(tag));
        Ok(token)
    }

    fn mac(&self) -> Result<HmacSha256, TokenError> {
        <HmacSha256 as Mac>::new_from_slice(&self.secret).map_err(|_| TokenError::WeakSecret)
    }
}
