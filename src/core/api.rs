//! HTTP API serving the mock verifier
//!
//! Endpoints:
//! - GET /health - Health check
//! - POST /challenge - Issue a challenge
//! - POST /challenge/submit - Verify a response
//! - GET /token/:id - Metadata for a minted token

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::verifier::{MockVerifier, TokenMetadata, Verifier};
use crate::error::VerifierError;
use crate::types::{IssuedChallenge, SubmissionPayload, VerificationOutcome};

/// Health response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub challenges_active: usize,
    pub tokens_issued: usize,
}

/// Error body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

struct ApiError(StatusCode, String);

impl From<VerifierError> for ApiError {
    fn from(err: VerifierError) -> Self {
        ApiError(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(ErrorResponse { error: self.1 })).into_response()
    }
}

/// Create the API router
pub fn create_router(verifier: Arc<MockVerifier>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/challenge", post(issue_challenge))
        .route("/challenge/submit", post(submit_response))
        .route("/token/:id", get(get_token))
        .with_state(verifier)
}

/// Health check endpoint
async fn health(State(verifier): State<Arc<MockVerifier>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: crate::VERSION.to_string(),
        challenges_active: verifier.active_challenges(),
        tokens_issued: verifier.tokens_issued(),
    })
}

async fn issue_challenge(
    State(verifier): State<Arc<MockVerifier>>,
) -> Result<Json<IssuedChallenge>, ApiError> {
    let challenge = verifier.issue_challenge().await?;
    Ok(Json(challenge))
}

/// Rejections are still 200; `success` carries the verdict
async fn submit_response(
    State(verifier): State<Arc<MockVerifier>>,
    Json(payload): Json<SubmissionPayload>,
) -> Result<Json<VerificationOutcome>, ApiError> {
    let outcome = verifier.submit(&payload).await?;
    if !outcome.success {
        warn!(challenge = %payload.challenge_id, "submission rejected");
    }
    Ok(Json(outcome))
}

async fn get_token(
    State(verifier): State<Arc<MockVerifier>>,
    Path(id): Path<String>,
) -> Result<Json<TokenMetadata>, ApiError> {
    verifier
        .token(&id)
        .map(Json)
        .ok_or_else(|| ApiError(StatusCode::NOT_FOUND, format!("unknown token {id}")))
}

/// Run the API server
pub async fn run_server(
    addr: &str,
    verifier: Arc<MockVerifier>,
) -> Result<(), Box<dyn std::error::Error>> {
    let router = create_router(verifier);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "mock verifier listening");
    println!("PoPAI mock verifier running on {}", addr);
    println!("  POST /challenge        - Issue challenge");
    println!("  POST /challenge/submit - Submit response");
    println!("  GET  /token/:id        - Token metadata");
    println!("  GET  /health           - Health check");
    axum::serve(listener, router).await?;
    Ok(())
}
