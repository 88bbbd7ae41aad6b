//! Outcome router: what happens after the verdict
//!
//! SUCCEEDED schedules one delayed exit per episode. FAILED offers retry.

use std::time::Duration;

use tracing::{debug, info};

use crate::core::session::{SessionMachine, SessionState, Transition};
use crate::types::SessionPhase;

/// What the flow should do for the current state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteAction {
    /// Send the exit signal after `delay`, if still in this generation
    ScheduleExit { generation: u64, delay: Duration },
    /// Show retry with this message
    OfferRetry { message: String },
    None,
}

#[derive(Debug, Clone)]
pub struct OutcomeRouter {
    exit_delay: Duration,
    exited: Option<u64>,
}

impl OutcomeRouter {
    pub fn new(exit_delay: Duration) -> Self {
        Self {
            exit_delay,
            exited: None,
        }
    }

    pub fn route(&self, machine: &SessionMachine) -> RouteAction {
        match machine.state() {
            SessionState::Succeeded { .. } if self.exited != Some(machine.generation()) => {
                RouteAction::ScheduleExit {
                    generation: machine.generation(),
                    delay: self.exit_delay,
                }
            }
            SessionState::Failed { error, .. } => RouteAction::OfferRetry {
                message: error.user_message(),
            },
            _ => RouteAction::None,
        }
    }

    /// Exit timer fired. Returns `true` exactly once per SUCCEEDED episode.
    pub fn on_exit_due(&mut self, generation: u64, machine: &SessionMachine) -> bool {
        if machine.phase() != SessionPhase::Succeeded || machine.generation() != generation {
            debug!(generation, "stale exit timer discarded");
            return false;
        }
        if self.exited == Some(generation) {
            return false;
        }
        self.exited = Some(generation);
        info!(generation, "exit signalled");
        true
    }

    /// The retry affordance: FAILED → IDLE and nothing else
    pub fn retry(&self, machine: &mut SessionMachine) -> Transition {
        machine.retry()
    }
}
