//! Verifier seam: challenge issuance and response judgement
//!
//! [`MockVerifier`] is the in-process reference verifier; [`HttpVerifier`]
//! talks to the same contract served by [`crate::core::api`].

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::VerifierError;
use crate::types::{IssuedChallenge, PromptKind, SubmissionPayload, VerificationOutcome};
use crate::{CHALLENGE_TTL_SECS, MOCK_PASS_RATE, TOKEN_PREFIX};

/// The remote collaborator that issues and judges challenges
#[async_trait]
pub trait Verifier: Send + Sync {
    async fn issue_challenge(&self) -> Result<IssuedChallenge, VerifierError>;

    async fn submit(&self, payload: &SubmissionPayload) -> Result<VerificationOutcome, VerifierError>;
}

/// Prompts the mock verifier draws from
pub const MOCK_PROMPTS: [(PromptKind, &str); 3] = [
    (PromptKind::Blink, "Blink twice slowly."),
    (PromptKind::Nod, "Nod your head up and down."),
    (PromptKind::SayPhrase, "Clearly say: 'My identity is sovereign'"),
];

/// Message for unknown, reused or expired challenge ids
pub const INVALID_CHALLENGE_MESSAGE: &str = "Invalid or expired challenge ID.";

/// Message for responses that did not pass the check
pub const CHECK_FAILED_MESSAGE: &str = "AI verification check failed. Please try again.";

/// Metadata of a token minted for a verified human
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub token_id: String,
    pub name: String,
    pub description: String,
    pub issued_at: DateTime<Utc>,
    pub verification_hash: String,
}

#[derive(Debug)]
struct ActiveChallenge {
    challenge: IssuedChallenge,
    issued_at: Instant,
}

#[derive(Debug)]
struct MockState {
    rng: StdRng,
    active: HashMap<String, ActiveChallenge>,
    tokens: HashMap<String, TokenMetadata>,
    verification_log: Vec<String>,
    next_challenge: u64,
    next_token: u64,
}

/// In-process verifier with a configurable pass rate
#[derive(Debug)]
pub struct MockVerifier {
    state: Mutex<MockState>,
    pass_rate: f64,
    challenge_ttl: Duration,
    prompts: Vec<(PromptKind, String)>,
}

impl Default for MockVerifier {
    fn default() -> Self {
        Self::new(MOCK_PASS_RATE, None)
    }
}

impl MockVerifier {
    /// `pass_rate` is clamped to [0, 1]; a seed makes runs reproducible
    pub fn new(pass_rate: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            state: Mutex::new(MockState {
                rng,
                active: HashMap::new(),
                tokens: HashMap::new(),
                verification_log: Vec::new(),
                next_challenge: 0,
                next_token: 0,
            }),
            pass_rate: pass_rate.clamp(0.0, 1.0),
            challenge_ttl: Duration::from_secs(CHALLENGE_TTL_SECS),
            prompts: MOCK_PROMPTS
                .iter()
                .map(|(kind, text)| (*kind, text.to_string()))
                .collect(),
        }
    }

    /// Issue only this prompt
    pub fn with_prompt(mut self, kind: PromptKind, text: impl Into<String>) -> Self {
        self.prompts = vec![(kind, text.into())];
        self
    }

    /// Challenges older than `ttl` are dropped and no longer accepted
    pub fn with_challenge_ttl(mut self, ttl: Duration) -> Self {
        self.challenge_ttl = ttl;
        self
    }

    pub fn pass_rate(&self) -> f64 {
        self.pass_rate
    }

    pub fn active_challenges(&self) -> usize {
        self.lock().map(|state| state.active.len()).unwrap_or(0)
    }

    pub fn tokens_issued(&self) -> usize {
        self.lock().map(|state| state.tokens.len()).unwrap_or(0)
    }

    pub fn token(&self, token_id: &str) -> Option<TokenMetadata> {
        self.lock().ok()?.tokens.get(token_id).cloned()
    }

    /// Verification hashes recorded so far, oldest first
    pub fn verification_log(&self) -> Vec<String> {
        self.lock()
            .map(|state| state.verification_log.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MockState>, VerifierError> {
        self.state
            .lock()
            .map_err(|_| VerifierError::Transport("mock verifier state poisoned".to_string()))
    }

    fn issue(&self) -> Result<IssuedChallenge, VerifierError> {
        let mut state = self.lock()?;
        if self.prompts.is_empty() {
            return Err(VerifierError::Protocol("no prompts configured".to_string()));
        }

        let ttl = self.challenge_ttl;
        let before = state.active.len();
        state.active.retain(|_, active| active.issued_at.elapsed() < ttl);
        let pruned = before - state.active.len();
        if pruned > 0 {
            debug!(pruned, "expired challenges dropped");
        }

        state.next_challenge += 1;
        let id_bytes: [u8; 4] = state.rng.gen();
        let nonce: [u8; 16] = state.rng.gen();
        let pick = state.rng.gen_range(0..self.prompts.len());
        let (kind, text) = &self.prompts[pick];

        let challenge = IssuedChallenge {
            id: format!("ch-{}-{}", state.next_challenge, hex::encode(id_bytes)),
            prompt_type: *kind,
            prompt_text: text.clone(),
            nonce: hex::encode(nonce),
        };
        state.active.insert(
            challenge.id.clone(),
            ActiveChallenge {
                challenge: challenge.clone(),
                issued_at: Instant::now(),
            },
        );
        info!(challenge = %challenge.id, kind = %challenge.prompt_type, "mock challenge issued");
        Ok(challenge)
    }

    fn judge(&self, payload: &SubmissionPayload) -> Result<VerificationOutcome, VerifierError> {
        let mut state = self.lock()?;

        // Challenge ids are single-use
        let challenge = match state.active.remove(&payload.challenge_id) {
            Some(active) if active.issued_at.elapsed() < self.challenge_ttl => active.challenge,
            Some(_) => {
                debug!(challenge = %payload.challenge_id, "expired challenge id");
                return Ok(VerificationOutcome::failed(INVALID_CHALLENGE_MESSAGE));
            }
            None => {
                debug!(challenge = %payload.challenge_id, "unknown challenge id");
                return Ok(VerificationOutcome::failed(INVALID_CHALLENGE_MESSAGE));
            }
        };

        let response_matches =
            payload.mock_data == challenge.prompt_type.response_classification();
        let draw: f64 = state.rng.gen();
        let passed = response_matches && draw < self.pass_rate;

        let verification_hash = verification_hash(payload, passed);
        state.verification_log.push(verification_hash.clone());
        info!(
            challenge = %payload.challenge_id,
            response_matches,
            passed,
            bytes = payload.encrypted_biometric_data.len(),
            "mock verification judged"
        );

        if !passed {
            return Ok(VerificationOutcome {
                success: false,
                nft_id: None,
                error_message: Some(CHECK_FAILED_MESSAGE.to_string()),
                verification_hash: Some(verification_hash),
            });
        }

        state.next_token += 1;
        let token_id = format!("{}-{}", TOKEN_PREFIX, state.next_token - 1);
        state.tokens.insert(
            token_id.clone(),
            TokenMetadata {
                token_id: token_id.clone(),
                name: "PoPAI Verified Human".to_string(),
                description: "This token certifies that the holder has successfully passed a \
                              PoPAI liveness and uniqueness challenge."
                    .to_string(),
                issued_at: Utc::now(),
                verification_hash: verification_hash.clone(),
            },
        );

        Ok(VerificationOutcome {
            success: true,
            nft_id: Some(token_id),
            error_message: None,
            verification_hash: Some(verification_hash),
        })
    }
}

#[async_trait]
impl Verifier for MockVerifier {
    async fn issue_challenge(&self) -> Result<IssuedChallenge, VerifierError> {
        self.issue()
    }

    async fn submit(&self, payload: &SubmissionPayload) -> Result<VerificationOutcome, VerifierError> {
        self.judge(payload)
    }
}

/// SHA-256 over the submission facts and the verdict, hex encoded
pub fn verification_hash(payload: &SubmissionPayload, passed: bool) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.challenge_id.as_bytes());
    hasher.update(payload.client_timestamp.to_le_bytes());
    hasher.update(payload.mock_data.as_bytes());
    hasher.update([passed as u8]);
    hex::encode(hasher.finalize())
}

/// Verifier reached over HTTP
#[derive(Debug, Clone)]
pub struct HttpVerifier {
    client: reqwest::Client,
    base_url: String,
}

impl HttpVerifier {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, VerifierError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl Verifier for HttpVerifier {
    async fn issue_challenge(&self) -> Result<IssuedChallenge, VerifierError> {
        let response = self
            .client
            .post(self.url("/challenge"))
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<IssuedChallenge>().await?)
    }

    async fn submit(&self, payload: &SubmissionPayload) -> Result<VerificationOutcome, VerifierError> {
        let response = self
            .client
            .post(self.url("/challenge/submit"))
            .json(payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<VerificationOutcome>().await?)
    }
}
