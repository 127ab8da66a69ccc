//! Server configuration, loaded from the environment.
//!
//! Every variable is prefixed `MOORGATE_`. A `.env` file in the working
//! directory is honored for development; real deployments set the
//! environment directly.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use moorgate_auth::SigningKey;
use zeroize::Zeroizing;

/// Runtime configuration for the daemon.
///
/// Intentionally no `Debug` implementation: `token_secret` is credential
/// material.
#[derive(Clone)]
pub struct ServerConfig {
    /// Socket address to bind, e.g. `127.0.0.1:8045`.
    pub listen: String,
    /// Path of the SQLite nonce database.
    pub db_path: String,
    /// Passphrase of the network challenges are bound to.
    pub network_passphrase: String,
    /// Address of the deployed web auth contract (`C...`).
    pub web_auth_contract: String,
    /// The domain this server authenticates on behalf of.
    pub web_auth_domain: String,
    /// Home domains challenges may be issued for. Empty accepts any.
    pub home_domains: Vec<String>,
    /// JSON-RPC endpoint of the execution node.
    pub rpc_url: String,
    /// HMAC secret for minted tokens, at least 32 bytes.
    pub token_secret: Zeroizing<Vec<u8>>,
    /// File holding the server signing key seed as 64 hex characters.
    pub signing_key_file: PathBuf,
    /// How long issued challenges stay valid, in seconds.
    pub challenge_ttl_secs: i64,
    /// How long minted tokens stay valid, in seconds.
    pub token_ttl_secs: i64,
    /// Challenge issuance allowance per account per minute. Zero disables
    /// rate limiting.
    pub rate_limit_per_minute: u32,
    /// Comma-separated allowed CORS origins. Unset means permissive.
    pub cors_origins: Option<String>,
}

impl ServerConfig {
    /// Load configuration from the environment (and `.env`, if present).
    ///
    /// # Errors
    ///
    /// A required variable is missing or a numeric one fails to parse.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(ServerConfig {
            listen: env::var("MOORGATE_LISTEN").unwrap_or_else(|_| "127.0.0.1:8045".to_string()),
            db_path: env::var("MOORGATE_DB_PATH").unwrap_or_else(|_| "moorgate.db".to_string()),
            network_passphrase: env::var("MOORGATE_NETWORK_PASSPHRASE")
                .context("MOORGATE_NETWORK_PASSPHRASE is required")?,
            web_auth_contract: env::var("MOORGATE_WEBAUTH_CONTRACT")
                .context("MOORGATE_WEBAUTH_CONTRACT is required")?,
            web_auth_domain: env::var("MOORGATE_WEB_AUTH_DOMAIN")
                .context("MOORGATE_WEB_AUTH_DOMAIN is required")?,
            home_domains: env::var("MOORGATE_HOME_DOMAINS")
                .map(|list| {
                    list.split(',')
                        .map(str::trim)
                        .filter(|domain| !domain.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            rpc_url: env::var("MOORGATE_RPC_URL").context("MOORGATE_RPC_URL is required")?,
            token_secret: Zeroizing::new(
                env::var("MOORGATE_TOKEN_SECRET")
                    .context("MOORGATE_TOKEN_SECRET is required")?
                    .into_bytes(),
            ),
            signing_key_file: env::var("MOORGATE_SIGNING_KEY_FILE")
                .map(PathBuf::from)
                .context("MOORGATE_SIGNING_KEY_FILE is required")?,
            challenge_ttl_secs: env::var("MOORGATE_CHALLENGE_TTL_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .context("Invalid MOORGATE_CHALLENGE_TTL_SECS")?,
            token_ttl_secs: env::var("MOORGATE_TOKEN_TTL_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .context("Invalid MOORGATE_TOKEN_TTL_SECS")?,
            rate_limit_per_minute: env::var("MOORGATE_RATE_LIMIT_PER_MINUTE")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .context("Invalid MOORGATE_RATE_LIMIT_PER_MINUTE")?,
            cors_origins: env::var("MOORGATE_CORS_ORIGINS").ok(),
        })
    }
}

/// Load the server signing key from `path`, a file of 64 hex characters.
///
/// On Unix the file must not be readable by group or world.
///
/// # Errors
///
/// The file is missing, too open, not hex, or not a 32-byte seed.
pub fn load_signing_key(path: &Path) -> Result<SigningKey> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let mode = std::fs::metadata(path)
            .with_context(|| format!("reading {}", path.display()))?
            .permissions()
            .mode();
        if mode & 0o077 != 0 {
            bail!(
                "{} is readable by other users; chmod 600 it",
                path.display()
            );
        }
    }

    let encoded = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let seed = Zeroizing::new(
        hex::decode(encoded.trim()).with_context(|| format!("{} is not hex", path.display()))?,
    );
    let key = SigningKey::from_seed(&seed)
        .with_context(|| format!("{} does not hold a 32-byte seed", path.display()))?;
    Ok(key)
}

/// Write `key`'s seed to `path` as hex, owner-readable only.
///
/// # Errors
///
/// The file cannot be written or its permissions cannot be set.
pub fn write_signing_key(path: &Path, key: &SigningKey) -> Result<()> {
    let seed = key.to_seed();
    std::fs::write(path, hex::encode(seed.as_slice()))
        .with_context(|| format!("writing {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .with_context(|| format!("restricting permissions on {}", path.display()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signing_key_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.key");

        let key = SigningKey::generate();
        write_signing_key(&path, &key).unwrap();

        let loaded = load_signing_key(&path).unwrap();
        assert_eq!(loaded.address(), key.address());
    }

    #[cfg(unix)]
    #[test]
    fn test_world_readable_key_file_rejected() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.key");
        write_signing_key(&path, &SigningKey::generate()).unwrap();

        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        let err = load_signing_key(&path).err().unwrap();
        assert!(err.to_string().contains("chmod 600"));
    }

    #[test]
    fn test_non_hex_key_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.key");
        std::fs::write(&path, "not hex at all").unwrap();

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600)).unwrap();
        }

        assert!(load_signing_key(&path).is_err());
    }

    #[test]
    fn test_truncated_seed_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.key");
        std::fs::write(&path, hex::encode([7u8; 16])).unwrap();

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600)).unwrap();
        }

        assert!(load_signing_key(&path).is_err());
    }
}
