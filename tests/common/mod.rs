//! Shared helpers for the flow integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;

use popai::core::{ChallengeFlow, FlowHandle, MockCapture, StaticDeviceAccess, Verifier};
use popai::types::{FlowUpdate, IssuedChallenge, PromptKind, SubmissionPayload, VerificationOutcome};
use popai::{FlowConfig, VerifierError};

/// Verifier that issues one fixed prompt kind and replays queued verdicts
pub struct ScriptedVerifier {
    kind: PromptKind,
    issue_failures: Mutex<VecDeque<VerifierError>>,
    verdicts: Mutex<VecDeque<Result<VerificationOutcome, VerifierError>>>,
    submitted: Mutex<Vec<SubmissionPayload>>,
    issued: AtomicUsize,
    submit_delay: Duration,
}

impl ScriptedVerifier {
    pub fn new(kind: PromptKind) -> Self {
        Self {
            kind,
            issue_failures: Mutex::new(VecDeque::new()),
            verdicts: Mutex::new(VecDeque::new()),
            submitted: Mutex::new(Vec::new()),
            issued: AtomicUsize::new(0),
            submit_delay: Duration::ZERO,
        }
    }

    pub fn then(self, verdict: Result<VerificationOutcome, VerifierError>) -> Self {
        self.verdicts.lock().unwrap().push_back(verdict);
        self
    }

    /// Fail the next issuance with `error`; later issuances succeed
    pub fn failing_issue(self, error: VerifierError) -> Self {
        self.issue_failures.lock().unwrap().push_back(error);
        self
    }

    pub fn with_submit_delay(mut self, delay: Duration) -> Self {
        self.submit_delay = delay;
        self
    }

    pub fn issued(&self) -> usize {
        self.issued.load(Ordering::SeqCst)
    }

    pub fn submitted(&self) -> Vec<SubmissionPayload> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl Verifier for ScriptedVerifier {
    async fn issue_challenge(&self) -> Result<IssuedChallenge, VerifierError> {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(error) = self.issue_failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        Ok(IssuedChallenge {
            id: format!("ch-{n}"),
            prompt_type: self.kind,
            prompt_text: format!("{} prompt", self.kind),
            nonce: "00ff".to_string(),
        })
    }

    async fn submit(&self, payload: &SubmissionPayload) -> Result<VerificationOutcome, VerifierError> {
        if !self.submit_delay.is_zero() {
            tokio::time::sleep(self.submit_delay).await;
        }
        self.submitted.lock().unwrap().push(payload.clone());
        self.verdicts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(passed("POP-0")))
    }
}

pub fn passed(token: &str) -> VerificationOutcome {
    VerificationOutcome {
        success: true,
        nft_id: Some(token.to_string()),
        error_message: None,
        verification_hash: Some("ab".repeat(32)),
    }
}

pub fn rejected(message: &str) -> VerificationOutcome {
    VerificationOutcome::failed(message)
}

/// Spawn a flow with default timing, subscribed before the probe runs
pub fn spawn_flow(
    access: StaticDeviceAccess,
    verifier: Arc<ScriptedVerifier>,
) -> (FlowHandle, broadcast::Receiver<FlowUpdate>) {
    let flow = ChallengeFlow::new(
        FlowConfig::default(),
        Arc::new(access),
        verifier,
        Arc::new(MockCapture),
    );
    let updates = flow.subscribe();
    (flow.spawn(), updates)
}

/// Receive updates until one matches, returning everything received
pub async fn recv_until(
    updates: &mut broadcast::Receiver<FlowUpdate>,
    done: impl Fn(&FlowUpdate) -> bool,
) -> Vec<FlowUpdate> {
    let mut seen = Vec::new();
    let result = tokio::time::timeout(Duration::from_secs(120), async {
        loop {
            let update = updates.recv().await.expect("flow closed");
            let finished = done(&update);
            seen.push(update);
            if finished {
                break;
            }
        }
    })
    .await;
    assert!(result.is_ok(), "timed out, received: {seen:#?}");
    seen
}
