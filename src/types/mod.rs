//! Core types for PoPAI

mod capability;
mod challenge;
mod output;
mod payload;
mod reason;
mod state;

pub use capability::{Capability, CapabilitySnapshot, CapabilityStatus};
pub use challenge::{ChallengeSpec, IssuedChallenge, PromptKind};
pub use output::FlowUpdate;
pub use payload::{BehavioralSignals, ObservedResponse, SubmissionPayload, VerificationOutcome};
pub use reason::ReasonCode;
pub use state::SessionPhase;
