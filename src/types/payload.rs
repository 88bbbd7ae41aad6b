//! Submission payload and verification outcome

use serde::{Deserialize, Serialize};

use crate::{PLACEHOLDER_REACTION_TIME_MS, PLACEHOLDER_RESPONSE_BYTES};

/// Behavioural signals collected while the user responds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehavioralSignals {
    /// Pointer samples as (x, y, t_ms)
    pub mouse_movements: Vec<(f64, f64, u64)>,
    /// Milliseconds from prompt to first response
    pub reaction_time: u64,
}

impl BehavioralSignals {
    /// Serialized blob carried in the payload
    pub fn to_blob(&self) -> String {
        // Only plain numbers and vectors; serialization cannot fail.
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

impl Default for BehavioralSignals {
    fn default() -> Self {
        Self {
            mouse_movements: Vec::new(),
            reaction_time: PLACEHOLDER_REACTION_TIME_MS,
        }
    }
}

/// What the capture device observed during the countdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedResponse {
    /// Opaque capture bytes, never interpreted by the flow
    pub response_bytes: Vec<u8>,
    pub behavioral: BehavioralSignals,
}

impl ObservedResponse {
    /// Placeholder response used when no capture device is attached
    pub fn placeholder() -> Self {
        Self {
            response_bytes: PLACEHOLDER_RESPONSE_BYTES.to_vec(),
            behavioral: BehavioralSignals::default(),
        }
    }
}

/// Payload sent to the verifier, built once when the countdown reaches zero
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionPayload {
    pub challenge_id: String,
    /// Response classification derived from the prompt kind
    pub mock_data: String,
    /// Client wall-clock time at construction (epoch milliseconds)
    pub client_timestamp: u64,
    pub encrypted_biometric_data: Vec<u8>,
    /// JSON blob of [`BehavioralSignals`]
    pub behavioral_data: String,
}

/// Verdict returned by the verifier for one submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nft_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_hash: Option<String>,
}

impl VerificationOutcome {
    /// Failed outcome carrying only a message
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            nft_id: None,
            error_message: Some(message.into()),
            verification_hash: None,
        }
    }

    /// Reason/detail text, if the verifier supplied one
    pub fn detail(&self) -> Option<&str> {
        self.error_message.as_deref()
    }
}
