//! Submission pipeline: capture → payload → verifier → verdict

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::core::capture::ResponseCapture;
use crate::core::session::SubmissionTicket;
use crate::core::verifier::Verifier;
use crate::error::FlowError;
use crate::types::{ChallengeSpec, ObservedResponse, SubmissionPayload, VerificationOutcome};

/// Result of submitting one ticket
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionReport {
    /// Generation of the episode that produced the ticket
    pub generation: u64,
    pub challenge_id: String,
    /// `Ok` only when the verifier said success=true
    pub verdict: Result<VerificationOutcome, FlowError>,
}

/// Packages responses and sends them to the verifier
#[derive(Clone)]
pub struct SubmissionPipeline {
    verifier: Arc<dyn Verifier>,
    capture: Arc<dyn ResponseCapture>,
}

impl SubmissionPipeline {
    pub fn new(verifier: Arc<dyn Verifier>, capture: Arc<dyn ResponseCapture>) -> Self {
        Self { verifier, capture }
    }

    /// Build the payload, stamped with the current wall-clock time
    pub fn build_payload(spec: &ChallengeSpec, observed: ObservedResponse) -> SubmissionPayload {
        SubmissionPayload {
            challenge_id: spec.id.clone(),
            mock_data: spec.kind.response_classification().to_string(),
            client_timestamp: Utc::now().timestamp_millis().max(0) as u64,
            encrypted_biometric_data: observed.response_bytes,
            behavioral_data: observed.behavioral.to_blob(),
        }
    }

    /// Submit once. Transport and protocol errors become a failed verdict;
    /// nothing is retried here.
    pub async fn submit(&self, ticket: SubmissionTicket) -> SubmissionReport {
        let (generation, spec) = ticket.into_parts();
        let verdict = self.run(&spec).await;
        SubmissionReport {
            generation,
            challenge_id: spec.id,
            verdict,
        }
    }

    async fn run(&self, spec: &ChallengeSpec) -> Result<VerificationOutcome, FlowError> {
        let observed = self.capture.capture(spec).await.map_err(|reason| {
            warn!(challenge = %spec.id, %reason, "response capture failed");
            FlowError::Submission(reason)
        })?;

        let payload = Self::build_payload(spec, observed);
        info!(
            challenge = %payload.challenge_id,
            classification = %payload.mock_data,
            bytes = payload.encrypted_biometric_data.len(),
            "submitting response"
        );

        match self.verifier.submit(&payload).await {
            Ok(outcome) if outcome.success => Ok(outcome),
            Ok(outcome) => Err(FlowError::VerificationRejected(
                outcome.detail().unwrap_or_default().to_string(),
            )),
            Err(error) => {
                warn!(challenge = %payload.challenge_id, %error, "submission failed");
                Err(FlowError::Submission(error.to_string()))
            }
        }
    }
}
