//! JSON-RPC client for the execution node.
//!
//! Both halves of the challenge lifecycle ride one method,
//! `simulateInvocation`:
//!
//! - `auth_mode: "record"` takes a bare invocation (base64 canonical
//!   bytes) and returns the authorization entries it requires, unsigned.
//! - `auth_mode: "enforce"` takes an assembled entry frame and re-runs
//!   the invocation with signature checking on.
//!
//! A transport failure or JSON-RPC error object is an availability
//! problem; a result with `"status": "rejected"` is the node's verdict on
//! the entries themselves. The two must stay distinct because the caller
//! maps them to different error classes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::prelude::*;
use moorgate_auth::{ExecutionClient, ExecutionError};
use moorgate_wire::{entries_from_base64, entries_to_base64, AuthorizationEntry, Invocation};
use serde::Deserialize;
use serde_json::json;

const RPC_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Deserialize)]
struct RpcResponse {
    result: Option<SimulateResult>,
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct SimulateResult {
    status: String,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    authorization_entries: Option<String>,
}

/// Execution client speaking JSON-RPC 2.0 to a chain node.
#[derive(Clone)]
pub struct RpcExecutionClient {
    client: reqwest::Client,
    url: String,
    next_id: Arc<AtomicU64>,
}

impl RpcExecutionClient {
    /// Create a client for the node at `url`.
    ///
    /// # Errors
    ///
    /// The underlying HTTP client cannot be built.
    pub fn new(url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(RPC_TIMEOUT).build()?;
        Ok(Self {
            client,
            url: url.into(),
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }

    async fn simulate(&self, params: serde_json::Value) -> Result<SimulateResult, ExecutionError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": "simulateInvocation",
            "params": params,
        });

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ExecutionError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExecutionError::Unavailable(format!("status {status}")));
        }

        let parsed: RpcResponse = response
            .json()
            .await
            .map_err(|e| ExecutionError::Unavailable(format!("invalid response: {e}")))?;

        if let Some(error) = parsed.error {
            return Err(ExecutionError::Unavailable(format!(
                "rpc error {}: {}",
                error.code, error.message
            )));
        }
        parsed.result.ok_or_else(|| {
            ExecutionError::Unavailable("response carries neither result nor error".to_string())
        })
    }
}

fn check_status(result: &SimulateResult) -> Result<(), ExecutionError> {
    match result.status.as_str() {
        "ok" => Ok(()),
        "rejected" => Err(ExecutionError::Rejected(
            result
                .reason
                .clone()
                .unwrap_or_else(|| "unspecified".to_string()),
        )),
        other => Err(ExecutionError::Unavailable(format!(
            "unknown simulation status {other:?}"
        ))),
    }
}

#[async_trait]
impl ExecutionClient for RpcExecutionClient {
    async fn required_entries(
        &self,
        invocation: &Invocation,
    ) -> Result<Vec<AuthorizationEntry>, ExecutionError> {
        let bytes = invocation
            .canonical_bytes()
            .map_err(|e| ExecutionError::Unavailable(format!("unencodable invocation: {e}")))?;

        let result = self
            .simulate(json!({
                "auth_mode": "record",
                "invocation": BASE64_STANDARD.encode(bytes),
            }))
            .await?;
        check_status(&result)?;

        let frame = result.authorization_entries.ok_or_else(|| {
            ExecutionError::Unavailable("record result carries no entries".to_string())
        })?;
        entries_from_base64(&frame)
            .map_err(|e| ExecutionError::Unavailable(format!("undecodable entries: {e}")))
    }

    async fn enforce(&self, entries: &[AuthorizationEntry]) -> Result<(), ExecutionError> {
        let frame = entries_to_base64(entries)
            .map_err(|e| ExecutionError::Unavailable(format!("unencodable entries: {e}")))?;

        let result = self
            .simulate(json!({
                "auth_mode": "enforce",
                "authorization_entries": frame,
            }))
            .await?;
        check_status(&result)
    }
}
