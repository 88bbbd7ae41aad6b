//! Flow updates published to observers and printed by the CLI

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ReasonCode, SessionPhase};

/// One observable change in a flow instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowUpdate {
    pub timestamp: DateTime<Utc>,
    pub phase: SessionPhase,
    /// Seconds left while counting
    #[serde(skip_serializing_if = "Option::is_none")]
    pub countdown: Option<u32>,
    /// Prompt text of the active challenge
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    pub reason: ReasonCode,
    /// User-facing message (errors, failure detail)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Retry affordance is available
    pub can_retry: bool,
    /// Surrounding application should leave the flow
    pub exit: bool,
}

impl FlowUpdate {
    pub fn new(phase: SessionPhase, reason: ReasonCode) -> Self {
        Self {
            timestamp: Utc::now(),
            phase,
            countdown: None,
            prompt: None,
            reason,
            message: None,
            can_retry: phase == SessionPhase::Failed,
            exit: false,
        }
    }

    pub fn with_countdown(mut self, remaining: u32) -> Self {
        self.countdown = Some(remaining);
        self
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_exit(mut self) -> Self {
        self.exit = true;
        self
    }

    /// The attempt failed or fell back to IDLE; nothing more happens until
    /// the next command
    pub fn ends_attempt(&self) -> bool {
        match self.phase {
            SessionPhase::Failed => true,
            SessionPhase::Idle => matches!(
                self.reason,
                ReasonCode::R005_START_REJECTED
                    | ReasonCode::R004_ISSUANCE_FAILED
                    | ReasonCode::R001_MICROPHONE_REQUIRED
            ),
            _ => false,
        }
    }

    /// Format for terminal display (with colors)
    pub fn to_terminal_string(&self) -> String {
        let color = self.phase.color_code();
        let reset = SessionPhase::color_reset();
        format!("{}{} {}{}", color, self.phase.emoji(), self.body(), reset)
    }

    /// Format for parseable output (no colors)
    pub fn to_parseable_string(&self) -> String {
        format!("{} | reason={}", self.body(), self.reason.code())
    }

    fn body(&self) -> String {
        let mut line = format!("state={}", self.phase);
        if let Some(prompt) = &self.prompt {
            line.push_str(&format!(" | prompt=\"{}\"", prompt));
        }
        if let Some(remaining) = self.countdown {
            line.push_str(&format!(" | countdown={}", remaining));
        }
        if let Some(message) = &self.message {
            line.push_str(&format!(" | {}", message));
        }
        if self.can_retry {
            line.push_str(" | retry available");
        }
        if self.exit {
            line.push_str(" | exit");
        }
        line
    }
}
