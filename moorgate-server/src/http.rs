//! The HTTP surface: two challenge endpoints and a health probe.
//!
//! Handlers stay thin. Everything of consequence happens in
//! `moorgate-auth`; this layer extracts parameters, applies the rate
//! limit, and maps [`AuthError`] onto status codes and the public error
//! envelope. Internal detail is logged here, at the boundary, and never
//! echoed to the caller.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use moorgate_auth::{
    build_challenge, validate_challenge, AuthError, ChallengeRequest, DomainDiscovery,
    ExecutionClient, NonceStore, RequestError, ServerContext, SystemError, TokenSigner,
};
use moorgate_wire::entries_from_base64;
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::rate_limit::ChallengeRateLimiter;

/// Shared state behind every handler.
pub struct AppState {
    pub context: ServerContext,
    pub nonces: Arc<dyn NonceStore>,
    pub discovery: Arc<dyn DomainDiscovery>,
    pub execution: Arc<dyn ExecutionClient>,
    pub tokens: TokenSigner,
    pub rate_limiter: Option<ChallengeRateLimiter>,
}

/// Build the application router.
pub fn router(state: Arc<AppState>, cors_origins: Option<&str>) -> Router {
    Router::new()
        .route("/challenge", get(issue_challenge).post(verify_challenge))
        .route("/healthz", get(healthz))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origins))
}

fn cors_layer(origins: Option<&str>) -> CorsLayer {
    match origins {
        Some(list) => {
            let origins: Vec<HeaderValue> = list
                .split(',')
                .filter_map(|origin| origin.trim().parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        }
        None => CorsLayer::permissive(),
    }
}

#[derive(Deserialize)]
struct IssueParams {
    #[serde(default)]
    account: String,
    #[serde(default)]
    home_domain: String,
    #[serde(default)]
    client_domain: Option<String>,
}

async fn issue_challenge(
    State(state): State<Arc<AppState>>,
    params: Result<Query<IssueParams>, QueryRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::Malformed(e.to_string()))?;

    if let Some(limiter) = &state.rate_limiter {
        if !limiter.check(&params.account) {
            return Err(ApiError::RateLimited);
        }
    }

    let request = ChallengeRequest {
        account: params.account,
        home_domain: params.home_domain,
        client_domain: params.client_domain,
    };

    let challenge = build_challenge(
        &state.context,
        &request,
        chrono::Utc::now().timestamp(),
        state.nonces.as_ref(),
        state.discovery.as_ref(),
        state.execution.as_ref(),
    )
    .await?;

    let frame = challenge
        .to_base64()
        .map_err(|e| AuthError::from(SystemError::from(e)))?;

    tracing::info!(
        account = %request.account,
        home_domain = %request.home_domain,
        entries = challenge.entries.len(),
        "challenge issued"
    );

    Ok(Json(json!({
        "authorization_entries": frame,
        "network_passphrase": challenge.network_passphrase,
    })))
}

#[derive(Deserialize)]
struct VerifyBody {
    #[serde(default)]
    authorization_entries: String,
}

async fn verify_challenge(
    State(state): State<Arc<AppState>>,
    body: Result<Json<VerifyBody>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::Malformed(e.to_string()))?;

    if body.authorization_entries.is_empty() {
        return Err(AuthError::from(RequestError::MissingParameter("authorization_entries")).into());
    }
    let entries = entries_from_base64(&body.authorization_entries)
        .map_err(|e| AuthError::from(RequestError::from(e)))?;

    let verified = validate_challenge(
        &state.context,
        &entries,
        state.nonces.as_ref(),
        state.execution.as_ref(),
    )
    .await?;

    let token = state
        .tokens
        .issue(
            state.context.web_auth_domain(),
            &verified,
            chrono::Utc::now().timestamp(),
        )
        .map_err(|e| AuthError::from(SystemError::from(e)))?;

    tracing::info!(account = %verified.arguments().account, "token issued");

    Ok(Json(json!({ "token": token })))
}

async fn healthz() -> &'static str {
    "ok"
}

/// Error half of every handler, carrying the status mapping.
pub enum ApiError {
    /// An auth flow error, already classified.
    Auth(AuthError),
    /// The request could not even be parsed into parameters.
    Malformed(String),
    /// The caller is over the issuance allowance.
    RateLimited,
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Auth(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, description) = match &self {
            ApiError::Auth(err @ AuthError::Request(_)) => {
                tracing::warn!(error = %err, "request rejected");
                (
                    StatusCode::BAD_REQUEST,
                    err.public_code(),
                    err.public_description(),
                )
            }
            ApiError::Auth(err @ AuthError::Validation(_)) => {
                // The one place the real reason is recorded; the response
                // carries only the opaque description.
                tracing::warn!(error = %err, "challenge rejected");
                (
                    StatusCode::UNAUTHORIZED,
                    err.public_code(),
                    err.public_description(),
                )
            }
            ApiError::Auth(err) => {
                tracing::error!(error = %err, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    err.public_code(),
                    err.public_description(),
                )
            }
            ApiError::Malformed(detail) => {
                tracing::warn!(detail = %detail, "unparseable request");
                (StatusCode::BAD_REQUEST, "invalid_request", detail.clone())
            }
            ApiError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                "too many challenge requests".to_string(),
            ),
        };

        (
            status,
            Json(json!({ "error": code, "error_description": description })),
        )
            .into_response()
    }
}
