//! Session phase definitions

use serde::{Deserialize, Serialize};

/// The six phases of a challenge session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionPhase {
    /// No challenge, ready to start
    Idle,
    /// Waiting for the verifier to issue a challenge
    AwaitingChallenge,
    /// Countdown running, user is responding
    Counting,
    /// Response sent, waiting for the verdict
    Submitting,
    /// Verifier accepted the response
    Succeeded,
    /// Verifier rejected the response or could not be reached
    Failed,
}

impl SessionPhase {
    /// Phases in which the session holds a challenge
    pub fn holds_challenge(&self) -> bool {
        matches!(
            self,
            SessionPhase::Counting
                | SessionPhase::Submitting
                | SessionPhase::Succeeded
                | SessionPhase::Failed
        )
    }

    /// Get ANSI color code for terminal display
    pub fn color_code(&self) -> &'static str {
        match self {
            SessionPhase::Idle => "\x1b[90m",              // Gray
            SessionPhase::AwaitingChallenge => "\x1b[36m", // Cyan
            SessionPhase::Counting => "\x1b[33m",          // Yellow
            SessionPhase::Submitting => "\x1b[35m",        // Magenta
            SessionPhase::Succeeded => "\x1b[32m",         // Green
            SessionPhase::Failed => "\x1b[31m",            // Red
        }
    }

    /// Reset ANSI color
    pub fn color_reset() -> &'static str {
        "\x1b[0m"
    }

    /// Get emoji for phase
    pub fn emoji(&self) -> &'static str {
        match self {
            SessionPhase::Idle => "⏸",
            SessionPhase::AwaitingChallenge => "⏳",
            SessionPhase::Counting => "⏱",
            SessionPhase::Submitting => "📡",
            SessionPhase::Succeeded => "✅",
            SessionPhase::Failed => "❌",
        }
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionPhase::Idle => "IDLE",
            SessionPhase::AwaitingChallenge => "AWAITING_CHALLENGE",
            SessionPhase::Counting => "COUNTING",
            SessionPhase::Submitting => "SUBMITTING",
            SessionPhase::Succeeded => "SUCCEEDED",
            SessionPhase::Failed => "FAILED",
        };
        write!(f, "{}", name)
    }
}
