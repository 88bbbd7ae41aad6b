//! Integration tests for Slice 4 - HTTP API
//!
//! Tests the mock verifier endpoints, then drives the flow through
//! HttpVerifier against a live server.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::Value;
use tower::ServiceExt;

use popai::core::{
    create_router, ChallengeFlow, HttpVerifier, MockCapture, MockVerifier, StaticDeviceAccess,
    Verifier,
};
use popai::types::{PromptKind, SessionPhase, SubmissionPayload};
use popai::{FlowConfig, VerifierError};

fn create_test_router(pass_rate: f64) -> (axum::Router, Arc<MockVerifier>) {
    let verifier = Arc::new(MockVerifier::new(pass_rate, Some(42)).with_prompt(PromptKind::Nod, "Nod"));
    (create_router(verifier.clone()), verifier)
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn submit_request(payload: &SubmissionPayload) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/challenge/submit")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(payload).unwrap()))
        .unwrap()
}

fn payload(challenge_id: &str, classification: &str) -> SubmissionPayload {
    SubmissionPayload {
        challenge_id: challenge_id.to_string(),
        mock_data: classification.to_string(),
        client_timestamp: 1_700_000_000_000,
        encrypted_biometric_data: vec![1, 2, 3, 4],
        behavioral_data: r#"{"mouse_movements":[],"reaction_time":500}"#.to_string(),
    }
}

async fn spawn_server(verifier: Arc<MockVerifier>) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, create_router(verifier)).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _) = create_test_router(1.0);

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["challenges_active"], 0);
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_issue_then_verify() {
    let (app, verifier) = create_test_router(1.0);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/challenge")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let challenge = body_json(response).await;
    assert_eq!(challenge["prompt_type"], "Nod");
    assert_eq!(challenge["prompt_text"], "Nod");
    let id = challenge["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(submit_request(&payload(&id, "nodded")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let outcome = body_json(response).await;
    assert_eq!(outcome["success"], true);
    assert_eq!(outcome["nft_id"], "POP-0");
    assert!(outcome.get("error_message").is_none());
    assert_eq!(outcome["verification_hash"].as_str().unwrap().len(), 64);

    let response = app
        .oneshot(Request::builder().uri("/token/POP-0").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let token = body_json(response).await;
    assert_eq!(token["token_id"], "POP-0");
    assert_eq!(verifier.tokens_issued(), 1);
}

#[tokio::test]
async fn test_unknown_challenge_rejected_in_body() {
    let (app, _) = create_test_router(1.0);

    let response = app
        .oneshot(submit_request(&payload("ch-missing", "nodded")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let outcome = body_json(response).await;
    assert_eq!(outcome["success"], false);
    assert_eq!(outcome["error_message"], "Invalid or expired challenge ID.");
}

#[tokio::test]
async fn test_malformed_submission_is_client_error() {
    let (app, _) = create_test_router(1.0);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/challenge/submit")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"challenge_id": 5}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_http_verifier_round_trip() {
    let mock = Arc::new(MockVerifier::new(1.0, Some(7)).with_prompt(PromptKind::Blink, "Blink"));
    let base_url = spawn_server(mock.clone()).await;
    let verifier = HttpVerifier::new(base_url, Duration::from_secs(5)).unwrap();

    let challenge = verifier.issue_challenge().await.unwrap();
    assert_eq!(challenge.prompt_type, PromptKind::Blink);

    let outcome = verifier
        .submit(&payload(&challenge.id, "blinked"))
        .await
        .unwrap();
    assert!(outcome.success);
    assert!(mock.token(outcome.nft_id.as_deref().unwrap()).is_some());
}

#[tokio::test]
async fn test_http_verifier_unreachable() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let verifier = HttpVerifier::new(format!("http://{}", addr), Duration::from_secs(2)).unwrap();
    let err = verifier.issue_challenge().await.unwrap_err();
    assert!(matches!(err, VerifierError::Transport(_)));
}

#[tokio::test]
async fn test_flow_over_http() {
    let mock = Arc::new(MockVerifier::new(1.0, Some(9)).with_prompt(PromptKind::Nod, "Nod"));
    let base_url = spawn_server(mock.clone()).await;

    let config = FlowConfig {
        tick_interval_ms: 10,
        success_exit_delay_ms: 10,
        ..FlowConfig::default()
    };
    let verifier = Arc::new(HttpVerifier::new(base_url, config.request_timeout()).unwrap());
    let flow = ChallengeFlow::new(
        config,
        Arc::new(StaticDeviceAccess::granting_all()),
        verifier,
        Arc::new(MockCapture),
    );
    let mut updates = flow.subscribe();
    let handle = flow.spawn();
    handle.start();

    let exit = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let update = updates.recv().await.unwrap();
            if update.exit {
                return update;
            }
        }
    })
    .await
    .unwrap();

    assert_eq!(exit.phase, SessionPhase::Succeeded);
    assert_eq!(mock.tokens_issued(), 1);
    assert_eq!(mock.active_challenges(), 0);
    assert_eq!(handle.shutdown().await.unwrap(), SessionPhase::Succeeded);
}
