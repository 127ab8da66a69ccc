//! Harness for end-to-end tests.
//!
//! Boots the real router against an in-memory nonce store, a stub
//! execution node, and (when a test asks for one) a stub client domain,
//! all on ephemeral ports. Tests then drive the server over HTTP exactly
//! as a signing client would, including producing entry signatures
//! off-band.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::prelude::*;
use ed25519_dalek::{Signature, VerifyingKey};
use moorgate_auth::{
    entry_signature_payload, ChallengeArguments, Claims, ServerContext, SigningKey, TokenSigner,
};
use moorgate_server::discovery::HttpDiscovery;
use moorgate_server::http::{router, AppState};
use moorgate_server::rpc::RpcExecutionClient;
use moorgate_server::store::SqliteNonceStore;
use moorgate_wire::{
    entries_from_base64, entries_to_base64, Address, AuthorizationEntry, Credentials, Invocation,
};
use serde_json::json;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

pub const NETWORK_PASSPHRASE: &str = "Moorgate Test Network ; August 2026";
pub const WEB_AUTH_DOMAIN: &str = "auth.example.com";
pub const TOKEN_SECRET: &[u8] = b"an-integration-test-secret-32bytes!";

/// State shared with the stub execution node.
pub struct ChainState {
    network_id: [u8; 32],
    contract_signers: Mutex<HashMap<Address, VerifyingKey>>,
}

fn rejected(reason: &str) -> serde_json::Value {
    json!({ "status": "rejected", "reason": reason })
}

impl ChainState {
    /// Record mode: decode the invocation and emit one unsigned entry per
    /// participant named in its arguments.
    fn record(&self, params: &serde_json::Value) -> serde_json::Value {
        let Some(encoded) = params["invocation"].as_str() else {
            return rejected("missing invocation");
        };
        let Ok(bytes) = BASE64_STANDARD.decode(encoded) else {
            return rejected("invocation is not base64");
        };
        let Ok(invocation) = Invocation::decode(&bytes) else {
            return rejected("undecodable invocation");
        };
        let Ok(args) = ChallengeArguments::from_invocation(&invocation) else {
            return rejected("unrecognized arguments");
        };

        let mut participants = vec![args.account.clone(), args.web_auth_domain_account.clone()];
        if let Some(account) = &args.client_domain_account {
            participants.push(account.clone());
        }

        let mut entries = Vec::new();
        for participant in participants {
            let Ok(address) = participant.parse::<Address>() else {
                return rejected("participant is not an address");
            };
            entries.push(AuthorizationEntry::unsigned(address, invocation.clone()));
        }

        match entries_to_base64(&entries) {
            Ok(frame) => json!({ "status": "ok", "authorization_entries": frame }),
            Err(_) => rejected("unencodable entries"),
        }
    }

    /// Enforce mode: every entry must carry a live window and a signature
    /// by the key its address resolves to, the way the chain would check.
    fn enforce(&self, params: &serde_json::Value) -> serde_json::Value {
        let Some(frame) = params["authorization_entries"].as_str() else {
            return rejected("missing entries");
        };
        let Ok(entries) = entries_from_base64(frame) else {
            return rejected("undecodable entries");
        };
        let now = chrono::Utc::now().timestamp();

        for entry in &entries {
            let Credentials::Address {
                address,
                valid_until,
                signature,
            } = &entry.credentials
            else {
                return rejected("source-account credentials");
            };
            if signature.is_empty() {
                return rejected("unsigned entry");
            }
            if *valid_until < now {
                return rejected("expired entry");
            }

            let key = match address {
                Address::Account(bytes) => match VerifyingKey::from_bytes(bytes) {
                    Ok(key) => key,
                    Err(_) => return rejected("credential address is not a key"),
                },
                contract => {
                    let signers = self.contract_signers.lock().unwrap();
                    match signers.get(contract) {
                        Some(key) => *key,
                        None => return rejected("no signer registered for contract"),
                    }
                }
            };

            let Ok(payload) =
                entry_signature_payload(&self.network_id, *valid_until, &entry.invocation)
            else {
                return rejected("unencodable invocation");
            };
            let Ok(signature) = Signature::from_slice(signature) else {
                return rejected("malformed signature");
            };
            if key.verify_strict(&payload, &signature).is_err() {
                return rejected("signature verification failed");
            }
        }

        json!({ "status": "ok" })
    }
}

async fn simulate(
    State(chain): State<Arc<ChainState>>,
    Json(request): Json<serde_json::Value>,
) -> Json<serde_json::Value> {
    let params = &request["params"];
    let result = match params["auth_mode"].as_str() {
        Some("record") => chain.record(params),
        Some("enforce") => chain.enforce(params),
        _ => rejected("unknown auth_mode"),
    };
    Json(json!({ "jsonrpc": "2.0", "id": request["id"], "result": result }))
}

async fn spawn(router: Router) -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    port
}

async fn well_known(State(body): State<String>) -> String {
    body
}

/// Serve a well-known document advertising `address` as the signing key,
/// returning the domain it is reachable under.
pub async fn serve_client_domain(address: &Address) -> String {
    let body = format!("SIGNING_KEY = \"{address}\"\n");
    let router = Router::new()
        .route("/.well-known/webauth.toml", get(well_known))
        .with_state(body);
    format!("127.0.0.1:{}", spawn(router).await)
}

/// A running server instance wired to stubs.
pub struct TestServer {
    /// Base URL of the HTTP surface.
    pub url: String,
    pub client: reqwest::Client,
    pub chain: Arc<ChainState>,
    /// Address of the server's own signing key.
    pub server_address: Address,
    pub network_id: [u8; 32],
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with_home_domains(Vec::new()).await
    }

    pub async fn start_with_home_domains(home_domains: Vec<String>) -> Self {
        let server_key = SigningKey::generate();
        let server_address = server_key.address();

        let context = ServerContext::new(
            NETWORK_PASSPHRASE,
            Address::Contract([0xAA; 32]),
            server_key,
            WEB_AUTH_DOMAIN,
            home_domains,
            300,
        );
        let network_id = *context.network_id();

        let chain = Arc::new(ChainState {
            network_id,
            contract_signers: Mutex::new(HashMap::new()),
        });
        let rpc_url = {
            let router = Router::new()
                .route("/", post(simulate))
                .with_state(Arc::clone(&chain));
            format!("http://127.0.0.1:{}", spawn(router).await)
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(SqliteConnectOptions::new().filename(":memory:"))
            .await
            .unwrap();
        let store = SqliteNonceStore::new(pool, 300).await.unwrap();

        let state = Arc::new(AppState {
            context,
            nonces: Arc::new(store),
            discovery: Arc::new(HttpDiscovery::with_scheme("http").unwrap()),
            execution: Arc::new(RpcExecutionClient::new(rpc_url).unwrap()),
            tokens: TokenSigner::new(TOKEN_SECRET, 300).unwrap(),
            rate_limiter: None,
        });

        let port = spawn(router(state, None)).await;
        TestServer {
            url: format!("http://127.0.0.1:{port}"),
            client: reqwest::Client::new(),
            chain,
            server_address,
            network_id,
        }
    }

    /// Register `key` as the on-chain signer for a contract account.
    pub fn register_contract_signer(&self, contract: Address, key: &SigningKey) {
        let verifying = VerifyingKey::from_bytes(&key.public_key_bytes()).unwrap();
        self.chain
            .contract_signers
            .lock()
            .unwrap()
            .insert(contract, verifying);
    }

    /// GET /challenge with the given parameters.
    pub async fn fetch_challenge(
        &self,
        account: &str,
        home_domain: &str,
        client_domain: Option<&str>,
    ) -> reqwest::Response {
        let mut query = vec![("account", account), ("home_domain", home_domain)];
        if let Some(domain) = client_domain {
            query.push(("client_domain", domain));
        }
        self.client
            .get(format!("{}/challenge", self.url))
            .query(&query)
            .send()
            .await
            .unwrap()
    }

    /// GET /challenge, expect success, and decode the returned frame.
    pub async fn fetch_entries(
        &self,
        account: &str,
        home_domain: &str,
        client_domain: Option<&str>,
    ) -> Vec<AuthorizationEntry> {
        let response = self
            .fetch_challenge(account, home_domain, client_domain)
            .await;
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["network_passphrase"], NETWORK_PASSPHRASE);
        entries_from_base64(body["authorization_entries"].as_str().unwrap()).unwrap()
    }

    /// POST /challenge with the entries framed and encoded.
    pub async fn submit_entries(&self, entries: &[AuthorizationEntry]) -> reqwest::Response {
        let frame = entries_to_base64(entries).unwrap();
        self.submit_frame(&frame).await
    }

    /// POST /challenge with a raw frame string.
    pub async fn submit_frame(&self, frame: &str) -> reqwest::Response {
        self.client
            .post(format!("{}/challenge", self.url))
            .json(&json!({ "authorization_entries": frame }))
            .send()
            .await
            .unwrap()
    }

    /// Sign the entries credentialed to `address` with `key`, the way the
    /// client does off-band.
    pub fn sign_for(&self, entries: &mut [AuthorizationEntry], address: &Address, key: &SigningKey) {
        for entry in entries.iter_mut() {
            if entry.credentials.address() == Some(address) {
                sign_entry(entry, &self.network_id, key);
            }
        }
    }

    /// Verify a minted token against the test secret and return its claims.
    pub fn decode_token(&self, token: &str) -> Claims {
        TokenSigner::new(TOKEN_SECRET, 300)
            .unwrap()
            .verify(token, chrono::Utc::now().timestamp())
            .unwrap()
    }
}

/// Fill in one entry's signature over its payload.
pub fn sign_entry(entry: &mut AuthorizationEntry, network_id: &[u8; 32], key: &SigningKey) {
    let AuthorizationEntry {
        credentials,
        invocation,
    } = entry;
    let Credentials::Address {
        valid_until,
        signature,
        ..
    } = credentials
    else {
        panic!("entry carries source-account credentials");
    };
    let payload = entry_signature_payload(network_id, *valid_until, invocation).unwrap();
    *signature = key.sign(&payload).to_vec();
}
