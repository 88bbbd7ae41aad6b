//! Challenge prompts as issued by the verifier and as held by the session

use serde::{Deserialize, Serialize};

use crate::{DEFAULT_CHALLENGE_SECS, SPOKEN_CHALLENGE_SECS};

/// The kinds of prompt a verifier can issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PromptKind {
    Blink,
    Nod,
    SayPhrase,
    TurnLeft,
}

impl PromptKind {
    /// Response classification sent with the submission
    pub fn response_classification(&self) -> &'static str {
        match self {
            PromptKind::Blink => "blinked",
            PromptKind::Nod => "nodded",
            PromptKind::SayPhrase => "said_phrase",
            PromptKind::TurnLeft => "completed",
        }
    }

    /// Seconds the user is given to respond
    pub fn duration_secs(&self) -> u32 {
        match self {
            PromptKind::SayPhrase => SPOKEN_CHALLENGE_SECS,
            _ => DEFAULT_CHALLENGE_SECS,
        }
    }

    /// Spoken prompts need the microphone
    pub fn requires_microphone(&self) -> bool {
        matches!(self, PromptKind::SayPhrase)
    }
}

impl std::fmt::Display for PromptKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PromptKind::Blink => "Blink",
            PromptKind::Nod => "Nod",
            PromptKind::SayPhrase => "SayPhrase",
            PromptKind::TurnLeft => "TurnLeft",
        };
        write!(f, "{}", name)
    }
}

/// Challenge as it arrives from the verifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedChallenge {
    /// Unique id of this challenge instance
    pub id: String,
    pub prompt_type: PromptKind,
    pub prompt_text: String,
    /// Hex-encoded random nonce
    pub nonce: String,
}

/// Immutable challenge held by the active session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeSpec {
    pub id: String,
    pub kind: PromptKind,
    pub prompt_text: String,
    /// Countdown length, always >= 1
    pub duration_secs: u32,
    pub requires_microphone: bool,
}

impl ChallengeSpec {
    /// Derive the client-side spec from an issued challenge
    pub fn from_issued(issued: IssuedChallenge) -> Self {
        let kind = issued.prompt_type;
        Self {
            id: issued.id,
            kind,
            prompt_text: issued.prompt_text,
            duration_secs: kind.duration_secs(),
            requires_microphone: kind.requires_microphone(),
        }
    }
}
