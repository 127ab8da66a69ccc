//! Moorgate daemon entry point.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use moorgate_auth::{ServerContext, SigningKey, TokenSigner};
use moorgate_wire::Address;
use tracing_subscriber::EnvFilter;

use moorgate_server::config::{load_signing_key, write_signing_key, ServerConfig};
use moorgate_server::discovery::HttpDiscovery;
use moorgate_server::http::{router, AppState};
use moorgate_server::rate_limit::ChallengeRateLimiter;
use moorgate_server::rpc::RpcExecutionClient;
use moorgate_server::store::SqliteNonceStore;

const PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Web authentication server for contract accounts
#[derive(Parser)]
#[command(name = "moorgate-server", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the server (the default when no command is given)
    Serve,

    /// Generate a signing key file
    Keygen {
        /// Where to write the seed, as 64 hex characters
        #[arg(long)]
        out: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Decode and verify a token minted by this server
    InspectToken {
        /// The token to inspect
        token: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Keygen { out, force }) => cmd_keygen(&out, force),
        Some(Commands::InspectToken { token }) => cmd_inspect_token(&token),
        Some(Commands::Serve) | None => cmd_serve().await,
    }
}

fn cmd_keygen(out: &Path, force: bool) -> Result<()> {
    if out.exists() && !force {
        bail!("{} already exists (pass --force to overwrite)", out.display());
    }

    let key = SigningKey::generate();
    write_signing_key(out, &key)?;

    println!("Signing key written to {}", out.display());
    println!("Server address: {}", key.address());
    Ok(())
}

fn cmd_inspect_token(token: &str) -> Result<()> {
    dotenvy::dotenv().ok();
    let secret =
        std::env::var("MOORGATE_TOKEN_SECRET").context("MOORGATE_TOKEN_SECRET is required")?;
    let ttl_secs: i64 = std::env::var("MOORGATE_TOKEN_TTL_SECS")
        .unwrap_or_else(|_| "300".to_string())
        .parse()
        .context("Invalid MOORGATE_TOKEN_TTL_SECS")?;

    let signer = TokenSigner::new(secret.as_bytes(), ttl_secs)?;
    let claims = signer.verify(token, chrono::Utc::now().timestamp())?;

    println!("{}", serde_json::to_string_pretty(&claims)?);
    Ok(())
}

async fn cmd_serve() -> Result<()> {
    let config = ServerConfig::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("MOORGATE_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let web_auth_contract: Address = config
        .web_auth_contract
        .parse()
        .context("MOORGATE_WEBAUTH_CONTRACT is not a valid address")?;
    if !matches!(web_auth_contract, Address::Contract(_)) {
        bail!("MOORGATE_WEBAUTH_CONTRACT must be a contract (C...) address");
    }

    let signing_key = load_signing_key(&config.signing_key_file)?;
    let context = ServerContext::new(
        config.network_passphrase.clone(),
        web_auth_contract,
        signing_key,
        config.web_auth_domain.clone(),
        config.home_domains.clone(),
        config.challenge_ttl_secs,
    );
    tracing::info!(
        address = %context.server_address(),
        domain = %config.web_auth_domain,
        "server identity loaded"
    );

    let store = SqliteNonceStore::open(&config.db_path, config.challenge_ttl_secs)
        .await
        .context("opening nonce database")?;
    tracing::info!(path = %config.db_path, "nonce store ready");

    let tokens = TokenSigner::new(&config.token_secret, config.token_ttl_secs)
        .context("MOORGATE_TOKEN_SECRET unusable")?;
    let discovery = HttpDiscovery::new().context("building discovery client")?;
    let execution =
        RpcExecutionClient::new(config.rpc_url.as_str()).context("building rpc client")?;

    let rate_limiter = (config.rate_limit_per_minute > 0)
        .then(|| ChallengeRateLimiter::new(config.rate_limit_per_minute));

    spawn_purge_task(store.clone(), rate_limiter.clone());

    let state = Arc::new(AppState {
        context,
        nonces: Arc::new(store),
        discovery: Arc::new(discovery),
        execution: Arc::new(execution),
        tokens,
        rate_limiter,
    });
    let app = router(state, config.cors_origins.as_deref());

    let listener = tokio::net::TcpListener::bind(&config.listen)
        .await
        .with_context(|| format!("binding {}", config.listen))?;
    tracing::info!(listen = %config.listen, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

/// Periodically drop expired nonce rows and idle rate limit state.
fn spawn_purge_task(store: SqliteNonceStore, rate_limiter: Option<ChallengeRateLimiter>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PURGE_INTERVAL);
        interval.tick().await; // first tick fires immediately
        loop {
            interval.tick().await;
            match store.purge_expired(chrono::Utc::now().timestamp()).await {
                Ok(0) => {}
                Ok(purged) => tracing::debug!(purged, "expired nonces removed"),
                Err(e) => tracing::warn!(error = %e, "nonce purge failed"),
            }
            if let Some(limiter) = &rate_limiter {
                limiter.shrink();
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received SIGINT, shutting down"),
        () = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
