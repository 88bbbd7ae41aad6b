//! Reason codes for flow decisions and state changes

use serde::{Deserialize, Serialize};

/// Reason codes for all state changes and decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(non_camel_case_types)]
pub enum ReasonCode {
    // =========================================================================
    // R001: Capabilities
    // =========================================================================
    /// Permission prompts still pending
    R001_PROBING,
    /// Camera granted, flow may start
    R001_CAMERA_GRANTED,
    /// Camera denied, flow is blocked
    R001_CAMERA_DENIED,
    /// Challenge needs the microphone but it is not granted
    R001_MICROPHONE_REQUIRED,

    // =========================================================================
    // R002: Session states
    // =========================================================================
    R002_STATE_AWAITING,
    R002_STATE_COUNTING,
    R002_STATE_FAILED,

    // =========================================================================
    // R003: Countdown
    // =========================================================================
    /// Countdown decremented
    R003_TICK,
    /// Countdown reached zero, submission fired
    R003_REACHED_ZERO,
    /// Tick from an earlier episode was discarded
    R003_STALE_TICK,

    // =========================================================================
    // R004: Verifier
    // =========================================================================
    /// Verifier could not issue a challenge
    R004_ISSUANCE_FAILED,
    /// Transport or protocol failure while submitting
    R004_SUBMISSION_FAILED,
    /// Verifier checked the response and rejected it
    R004_VERIFICATION_REJECTED,
    /// Verifier accepted the response
    R004_VERIFIED,
    /// Reply arrived for a session that has moved on
    R004_STALE_REPLY,

    // =========================================================================
    // R005: Transitions
    // =========================================================================
    /// Start rejected, state unchanged
    R005_START_REJECTED,
    /// User retried after failure
    R005_RETRY,
    /// Attempt abandoned, back to idle
    R005_RESET,
    /// Exit signal sent to the surrounding application
    R005_EXIT_SIGNALLED,
    /// Input matched no transition
    R005_IGNORED,
}

impl ReasonCode {
    /// Get the code string (for logging)
    pub fn code(&self) -> &'static str {
        match self {
            Self::R001_PROBING => "R001_PROBING",
            Self::R001_CAMERA_GRANTED => "R001_CAMERA_GRANTED",
            Self::R001_CAMERA_DENIED => "R001_CAMERA_DENIED",
            Self::R001_MICROPHONE_REQUIRED => "R001_MICROPHONE_REQUIRED",
            Self::R002_STATE_AWAITING => "R002_STATE_AWAITING",
            Self::R002_STATE_COUNTING => "R002_STATE_COUNTING",
            Self::R002_STATE_FAILED => "R002_STATE_FAILED",
            Self::R003_TICK => "R003_TICK",
            Self::R003_REACHED_ZERO => "R003_REACHED_ZERO",
            Self::R003_STALE_TICK => "R003_STALE_TICK",
            Self::R004_ISSUANCE_FAILED => "R004_ISSUANCE_FAILED",
            Self::R004_SUBMISSION_FAILED => "R004_SUBMISSION_FAILED",
            Self::R004_VERIFICATION_REJECTED => "R004_VERIFICATION_REJECTED",
            Self::R004_VERIFIED => "R004_VERIFIED",
            Self::R004_STALE_REPLY => "R004_STALE_REPLY",
            Self::R005_START_REJECTED => "R005_START_REJECTED",
            Self::R005_RETRY => "R005_RETRY",
            Self::R005_RESET => "R005_RESET",
            Self::R005_EXIT_SIGNALLED => "R005_EXIT_SIGNALLED",
            Self::R005_IGNORED => "R005_IGNORED",
        }
    }

    /// Get human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::R001_PROBING => "Checking camera permissions",
            Self::R001_CAMERA_GRANTED => "Camera access granted",
            Self::R001_CAMERA_DENIED => "Camera access denied",
            Self::R001_MICROPHONE_REQUIRED => "Challenge requires microphone access",
            Self::R002_STATE_AWAITING => "Requesting challenge",
            Self::R002_STATE_COUNTING => "Challenge in progress",
            Self::R002_STATE_FAILED => "Verification failed",
            Self::R003_TICK => "Countdown tick",
            Self::R003_REACHED_ZERO => "Countdown finished",
            Self::R003_STALE_TICK => "Stale tick discarded",
            Self::R004_ISSUANCE_FAILED => "Failed to start challenge",
            Self::R004_SUBMISSION_FAILED => "Could not reach verifier",
            Self::R004_VERIFICATION_REJECTED => "Response rejected",
            Self::R004_VERIFIED => "Response accepted",
            Self::R004_STALE_REPLY => "Stale reply discarded",
            Self::R005_START_REJECTED => "Start rejected",
            Self::R005_RETRY => "Retrying",
            Self::R005_RESET => "Attempt abandoned",
            Self::R005_EXIT_SIGNALLED => "Leaving verification",
            Self::R005_IGNORED => "No transition",
        }
    }
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code(), self.description())
    }
}
