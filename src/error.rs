//! Error types for the challenge flow, the verifier seam and configuration

use thiserror::Error;

use crate::types::{Capability, ReasonCode};

/// Generic text shown when the verifier could not check the response
pub const SUBMISSION_FAILED_MESSAGE: &str =
    "Verification could not be completed. Please try again.";

/// Text shown when the verifier checked the response and rejected it
pub const REJECTED_MESSAGE: &str =
    "Please try again. Ensure good lighting and follow the prompt carefully.";

/// User-facing flow errors. All are recovered locally (Idle or Failed).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowError {
    /// A required capability was not granted
    #[error("{0} access was not granted")]
    CapabilityDenied(Capability),

    /// The verifier could not supply a challenge
    #[error("challenge issuance failed: {0}")]
    Issuance(String),

    /// Transport/protocol failure while submitting
    #[error("submission failed: {0}")]
    Submission(String),

    /// Verifier returned success=false
    #[error("verification rejected: {0}")]
    VerificationRejected(String),
}

impl FlowError {
    /// Message shown to the user
    pub fn user_message(&self) -> String {
        match self {
            FlowError::CapabilityDenied(Capability::Camera) => {
                "Camera access denied. Liveness checks require camera access; \
                 please grant permission in your settings."
                    .to_string()
            }
            FlowError::CapabilityDenied(Capability::Microphone) => {
                "This challenge requires microphone access, but it was not granted or is \
                 unavailable. Please try a different challenge or grant microphone access."
                    .to_string()
            }
            FlowError::Issuance(_) => "Failed to start challenge. Please try again.".to_string(),
            FlowError::Submission(_) => SUBMISSION_FAILED_MESSAGE.to_string(),
            FlowError::VerificationRejected(detail) if !detail.is_empty() => detail.clone(),
            FlowError::VerificationRejected(_) => REJECTED_MESSAGE.to_string(),
        }
    }

    pub fn reason(&self) -> ReasonCode {
        match self {
            FlowError::CapabilityDenied(Capability::Camera) => ReasonCode::R001_CAMERA_DENIED,
            FlowError::CapabilityDenied(Capability::Microphone) => {
                ReasonCode::R001_MICROPHONE_REQUIRED
            }
            FlowError::Issuance(_) => ReasonCode::R004_ISSUANCE_FAILED,
            FlowError::Submission(_) => ReasonCode::R004_SUBMISSION_FAILED,
            FlowError::VerificationRejected(_) => ReasonCode::R004_VERIFICATION_REJECTED,
        }
    }
}

/// Failures talking to the verifier
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifierError {
    #[error("verifier unreachable: {0}")]
    Transport(String),

    #[error("malformed verifier response: {0}")]
    Protocol(String),
}

impl From<reqwest::Error> for VerifierError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            VerifierError::Protocol(err.to_string())
        } else {
            VerifierError::Transport(err.to_string())
        }
    }
}

/// Configuration loading/validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
