//! Challenge session: the state machine for one verification attempt
//!
//! Transition table:
//! - IDLE → AWAITING_CHALLENGE: start, camera granted
//! - AWAITING_CHALLENGE → COUNTING: challenge issued, microphone satisfied
//! - AWAITING_CHALLENGE → IDLE: issuance failed, or microphone required but not granted
//! - COUNTING → SUBMITTING: countdown reached zero
//! - SUBMITTING → SUCCEEDED | FAILED: verdict arrived
//! - FAILED → IDLE: retry
//! - any non-IDLE except SUCCEEDED → IDLE: reset (attempt abandoned)
//!
//! SUCCEEDED is terminal. Anything else is a no-op. Every event from an async
//! source carries the generation it was started under; a mismatch means the
//! event is stale.

use tracing::{debug, info, warn};

use crate::core::countdown::{Countdown, CountdownStep};
use crate::error::FlowError;
use crate::types::{
    Capability, CapabilitySnapshot, ChallengeSpec, IssuedChallenge, ReasonCode, SessionPhase,
    VerificationOutcome,
};
use crate::VerifierError;

/// Session state; the challenge lives inside the variants that may hold one
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Idle,
    AwaitingChallenge,
    Counting {
        spec: ChallengeSpec,
        countdown: Countdown,
    },
    Submitting {
        spec: ChallengeSpec,
    },
    Succeeded {
        spec: ChallengeSpec,
        outcome: VerificationOutcome,
    },
    Failed {
        spec: ChallengeSpec,
        error: FlowError,
    },
}

impl SessionState {
    pub fn phase(&self) -> SessionPhase {
        match self {
            SessionState::Idle => SessionPhase::Idle,
            SessionState::AwaitingChallenge => SessionPhase::AwaitingChallenge,
            SessionState::Counting { .. } => SessionPhase::Counting,
            SessionState::Submitting { .. } => SessionPhase::Submitting,
            SessionState::Succeeded { .. } => SessionPhase::Succeeded,
            SessionState::Failed { .. } => SessionPhase::Failed,
        }
    }

    pub fn challenge(&self) -> Option<&ChallengeSpec> {
        match self {
            SessionState::Idle | SessionState::AwaitingChallenge => None,
            SessionState::Counting { spec, .. }
            | SessionState::Submitting { spec }
            | SessionState::Succeeded { spec, .. }
            | SessionState::Failed { spec, .. } => Some(spec),
        }
    }
}

/// Effect of an input on the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Moved {
        from: SessionPhase,
        to: SessionPhase,
    },
    /// Input matched no transition, or was stale
    Ignored,
}

impl Transition {
    pub fn moved(&self) -> bool {
        matches!(self, Transition::Moved { .. })
    }
}

/// Right to submit once for a challenge whose countdown reached zero.
///
/// Only [`SessionMachine::on_tick`] creates one, and submitting consumes it.
#[derive(Debug)]
pub struct SubmissionTicket {
    generation: u64,
    spec: ChallengeSpec,
}

impl SubmissionTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn spec(&self) -> &ChallengeSpec {
        &self.spec
    }

    pub(crate) fn into_parts(self) -> (u64, ChallengeSpec) {
        (self.generation, self.spec)
    }
}

/// What a countdown tick did
#[derive(Debug)]
pub enum TickOutcome {
    /// Counter decremented, still counting
    Remaining(u32),
    /// Counter reached zero and the session is now submitting
    Expired(SubmissionTicket),
    /// Tick did not apply
    Ignored(ReasonCode),
}

/// The session state machine
#[derive(Debug, Clone)]
pub struct SessionMachine {
    state: SessionState,
    capabilities: CapabilitySnapshot,
    generation: u64,
}

impl SessionMachine {
    /// New session in IDLE with a read-only capability snapshot
    pub fn new(capabilities: CapabilitySnapshot) -> Self {
        Self {
            state: SessionState::Idle,
            capabilities,
            generation: 0,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.phase()
    }

    pub fn challenge(&self) -> Option<&ChallengeSpec> {
        self.state.challenge()
    }

    pub fn capabilities(&self) -> CapabilitySnapshot {
        self.capabilities
    }

    /// Current generation; async events must carry this value to apply
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Seconds left while counting
    pub fn remaining(&self) -> Option<u32> {
        match &self.state {
            SessionState::Counting { countdown, .. } => Some(countdown.remaining()),
            _ => None,
        }
    }

    /// IDLE → AWAITING_CHALLENGE.
    ///
    /// Rejected with state unchanged unless the camera is granted.
    pub fn start(&mut self) -> Result<Transition, FlowError> {
        if self.phase() != SessionPhase::Idle {
            debug!(phase = %self.phase(), "start ignored");
            return Ok(Transition::Ignored);
        }
        if !self.capabilities.camera.is_granted() {
            warn!(camera = ?self.capabilities.camera, "start rejected: camera not granted");
            return Err(FlowError::CapabilityDenied(Capability::Camera));
        }
        self.generation += 1;
        Ok(self.move_to(SessionState::AwaitingChallenge))
    }

    /// AWAITING_CHALLENGE → COUNTING, or back to IDLE if the challenge
    /// needs a microphone that is not granted.
    pub fn on_challenge_issued(
        &mut self,
        generation: u64,
        issued: IssuedChallenge,
    ) -> Result<Transition, FlowError> {
        if !self.is_current(generation, SessionPhase::AwaitingChallenge) {
            debug!(generation, current = self.generation, "stale challenge discarded");
            return Ok(Transition::Ignored);
        }

        let spec = ChallengeSpec::from_issued(issued);
        if spec.requires_microphone && !self.capabilities.microphone.is_granted() {
            warn!(challenge = %spec.id, kind = %spec.kind, "challenge needs microphone, discarding");
            self.move_to(SessionState::Idle);
            return Err(FlowError::CapabilityDenied(Capability::Microphone));
        }

        info!(
            challenge = %spec.id,
            kind = %spec.kind,
            duration_secs = spec.duration_secs,
            "challenge accepted"
        );
        let countdown = Countdown::new(self.generation, spec.duration_secs);
        Ok(self.move_to(SessionState::Counting { spec, countdown }))
    }

    /// AWAITING_CHALLENGE → IDLE after the verifier failed to issue
    pub fn on_issuance_failed(
        &mut self,
        generation: u64,
        error: VerifierError,
    ) -> Result<Transition, FlowError> {
        if !self.is_current(generation, SessionPhase::AwaitingChallenge) {
            return Ok(Transition::Ignored);
        }
        warn!(%error, "challenge issuance failed");
        self.move_to(SessionState::Idle);
        Err(FlowError::Issuance(error.to_string()))
    }

    /// Apply one countdown tick. The tick that reaches zero moves the session
    /// to SUBMITTING and hands out the only [`SubmissionTicket`].
    pub fn on_tick(&mut self, generation: u64) -> TickOutcome {
        if !self.is_current(generation, SessionPhase::Counting) {
            return TickOutcome::Ignored(ReasonCode::R003_STALE_TICK);
        }

        let step = match &mut self.state {
            SessionState::Counting { countdown, .. } => countdown.tick(),
            _ => return TickOutcome::Ignored(ReasonCode::R005_IGNORED),
        };

        match step {
            CountdownStep::Remaining(remaining) => TickOutcome::Remaining(remaining),
            CountdownStep::Spent => TickOutcome::Ignored(ReasonCode::R003_STALE_TICK),
            CountdownStep::ReachedZero => {
                let previous = std::mem::replace(&mut self.state, SessionState::Idle);
                let spec = match previous {
                    SessionState::Counting { spec, .. } => spec,
                    other => {
                        self.state = other;
                        return TickOutcome::Ignored(ReasonCode::R005_IGNORED);
                    }
                };
                self.state = SessionState::Submitting { spec: spec.clone() };
                info!(challenge = %spec.id, "countdown reached zero, submitting");
                TickOutcome::Expired(SubmissionTicket {
                    generation: self.generation,
                    spec,
                })
            }
        }
    }

    /// SUBMITTING → SUCCEEDED | FAILED
    pub fn on_verdict(
        &mut self,
        generation: u64,
        verdict: Result<VerificationOutcome, FlowError>,
    ) -> Transition {
        if !self.is_current(generation, SessionPhase::Submitting) {
            debug!(generation, current = self.generation, "stale verdict discarded");
            return Transition::Ignored;
        }
        let spec = match &self.state {
            SessionState::Submitting { spec } => spec.clone(),
            _ => return Transition::Ignored,
        };
        match verdict {
            Ok(outcome) => {
                info!(challenge = %spec.id, token = ?outcome.nft_id, "verification succeeded");
                self.move_to(SessionState::Succeeded { spec, outcome })
            }
            Err(error) => {
                warn!(challenge = %spec.id, %error, "verification failed");
                self.move_to(SessionState::Failed { spec, error })
            }
        }
    }

    /// FAILED → IDLE, clearing challenge, countdown and outcome
    pub fn retry(&mut self) -> Transition {
        if self.phase() != SessionPhase::Failed {
            debug!(phase = %self.phase(), "retry ignored");
            return Transition::Ignored;
        }
        self.generation += 1;
        self.move_to(SessionState::Idle)
    }

    /// Abandon the attempt. Pending ticks and replies go stale.
    ///
    /// Ignored in IDLE and in SUCCEEDED, which keeps its pending exit.
    pub fn reset(&mut self) -> Transition {
        if matches!(self.phase(), SessionPhase::Idle | SessionPhase::Succeeded) {
            debug!(phase = %self.phase(), "reset ignored");
            return Transition::Ignored;
        }
        self.generation += 1;
        self.move_to(SessionState::Idle)
    }

    /// Invalidate every pending tick and reply (flow teardown)
    pub fn invalidate(&mut self) {
        self.generation += 1;
        debug!(generation = self.generation, "session invalidated");
    }

    fn is_current(&self, generation: u64, phase: SessionPhase) -> bool {
        generation == self.generation && self.phase() == phase
    }

    fn move_to(&mut self, next: SessionState) -> Transition {
        let from = self.phase();
        self.state = next;
        let to = self.phase();
        debug!(%from, %to, generation = self.generation, "session transition");
        Transition::Moved { from, to }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CapabilityStatus, PromptKind};

    fn issued(kind: PromptKind) -> IssuedChallenge {
        IssuedChallenge {
            id: "ch-1".to_string(),
            prompt_type: kind,
            prompt_text: "Blink twice slowly.".to_string(),
            nonce: "abcd".to_string(),
        }
    }

    fn counting(kind: PromptKind) -> SessionMachine {
        let mut machine = SessionMachine::new(CapabilitySnapshot::all_granted());
        machine.start().unwrap();
        let generation = machine.generation();
        machine.on_challenge_issued(generation, issued(kind)).unwrap();
        machine
    }

    fn assert_challenge_invariant(machine: &SessionMachine) {
        assert_eq!(machine.challenge().is_some(), machine.phase().holds_challenge());
    }

    #[test]
    fn test_initial_state_is_idle() {
        let machine = SessionMachine::new(CapabilitySnapshot::all_granted());
        assert_eq!(machine.phase(), SessionPhase::Idle);
        assert!(machine.challenge().is_none());
    }

    #[test]
    fn test_start_requires_camera() {
        for camera in [CapabilityStatus::Denied, CapabilityStatus::Unknown] {
            let mut machine =
                SessionMachine::new(CapabilitySnapshot::new(camera, CapabilityStatus::Granted));
            let err = machine.start().unwrap_err();
            assert_eq!(err, FlowError::CapabilityDenied(Capability::Camera));
            assert_eq!(machine.phase(), SessionPhase::Idle);
        }
    }

    #[test]
    fn test_microphone_required_returns_to_idle() {
        let mut machine = SessionMachine::new(CapabilitySnapshot::new(
            CapabilityStatus::Granted,
            CapabilityStatus::Denied,
        ));
        machine.start().unwrap();
        let generation = machine.generation();
        let err = machine
            .on_challenge_issued(generation, issued(PromptKind::SayPhrase))
            .unwrap_err();
        assert_eq!(err, FlowError::CapabilityDenied(Capability::Microphone));
        assert_eq!(machine.phase(), SessionPhase::Idle);
        assert!(machine.challenge().is_none());
    }

    #[test]
    fn test_microphone_denied_allows_visual_prompt() {
        let mut machine = SessionMachine::new(CapabilitySnapshot::new(
            CapabilityStatus::Granted,
            CapabilityStatus::Denied,
        ));
        machine.start().unwrap();
        let generation = machine.generation();
        machine
            .on_challenge_issued(generation, issued(PromptKind::Nod))
            .unwrap();
        assert_eq!(machine.phase(), SessionPhase::Counting);
    }

    #[test]
    fn test_issuance_failure_returns_to_idle() {
        let mut machine = SessionMachine::new(CapabilitySnapshot::all_granted());
        machine.start().unwrap();
        let generation = machine.generation();
        let err = machine
            .on_issuance_failed(generation, VerifierError::Transport("down".into()))
            .unwrap_err();
        assert!(matches!(err, FlowError::Issuance(_)));
        assert_eq!(machine.phase(), SessionPhase::Idle);
    }

    #[test]
    fn test_countdown_reaches_zero_exactly_once() {
        let mut machine = counting(PromptKind::Blink);
        let generation = machine.generation();
        assert_eq!(machine.remaining(), Some(5));

        let mut expired = 0;
        for _ in 0..10 {
            match machine.on_tick(generation) {
                TickOutcome::Expired(ticket) => {
                    expired += 1;
                    assert_eq!(ticket.spec().id, "ch-1");
                    assert_eq!(machine.phase(), SessionPhase::Submitting);
                }
                TickOutcome::Remaining(_) => assert_eq!(machine.phase(), SessionPhase::Counting),
                TickOutcome::Ignored(_) => assert_eq!(machine.phase(), SessionPhase::Submitting),
            }
            assert_challenge_invariant(&machine);
        }
        assert_eq!(expired, 1);
    }

    #[test]
    fn test_stale_tick_ignored() {
        let mut machine = counting(PromptKind::Blink);
        let generation = machine.generation();
        machine.invalidate();
        assert!(matches!(
            machine.on_tick(generation),
            TickOutcome::Ignored(ReasonCode::R003_STALE_TICK)
        ));
        assert_eq!(machine.remaining(), Some(5));
    }

    #[test]
    fn test_verdict_paths() {
        let mut machine = counting(PromptKind::Nod);
        let generation = machine.generation();
        for _ in 0..5 {
            machine.on_tick(generation);
        }
        let transition = machine.on_verdict(
            generation,
            Err(FlowError::VerificationRejected("nope".into())),
        );
        assert!(transition.moved());
        assert_eq!(machine.phase(), SessionPhase::Failed);
        assert_challenge_invariant(&machine);

        assert!(machine.retry().moved());
        assert_eq!(machine.phase(), SessionPhase::Idle);
        assert!(machine.challenge().is_none());
    }

    #[test]
    fn test_stale_verdict_ignored() {
        let mut machine = counting(PromptKind::Nod);
        let generation = machine.generation();
        for _ in 0..5 {
            machine.on_tick(generation);
        }
        machine.invalidate();
        let outcome = VerificationOutcome {
            success: true,
            nft_id: None,
            error_message: None,
            verification_hash: None,
        };
        assert_eq!(machine.on_verdict(generation, Ok(outcome)), Transition::Ignored);
        assert_eq!(machine.phase(), SessionPhase::Submitting);
    }

    #[test]
    fn test_retry_in_idle_is_noop() {
        let mut machine = SessionMachine::new(CapabilitySnapshot::all_granted());
        let generation = machine.generation();
        assert_eq!(machine.retry(), Transition::Ignored);
        assert_eq!(machine.phase(), SessionPhase::Idle);
        assert_eq!(machine.generation(), generation);
    }

    #[test]
    fn test_retry_while_counting_is_noop() {
        let mut machine = counting(PromptKind::Blink);
        assert_eq!(machine.retry(), Transition::Ignored);
        assert_eq!(machine.phase(), SessionPhase::Counting);
    }

    #[test]
    fn test_reset_while_counting_stales_ticks() {
        let mut machine = counting(PromptKind::Blink);
        let old = machine.generation();
        assert!(machine.reset().moved());
        assert_eq!(machine.phase(), SessionPhase::Idle);
        assert!(machine.challenge().is_none());

        machine.start().unwrap();
        let current = machine.generation();
        machine
            .on_challenge_issued(current, issued(PromptKind::Nod))
            .unwrap();
        for _ in 0..10 {
            assert!(matches!(machine.on_tick(old), TickOutcome::Ignored(_)));
        }
        assert_eq!(machine.remaining(), Some(5));
    }

    #[test]
    fn test_reset_after_success_is_noop() {
        let mut machine = counting(PromptKind::Nod);
        let generation = machine.generation();
        while !matches!(machine.on_tick(generation), TickOutcome::Expired(_)) {}
        let outcome = VerificationOutcome {
            success: true,
            nft_id: Some("POP-0".into()),
            error_message: None,
            verification_hash: None,
        };
        assert!(machine.on_verdict(generation, Ok(outcome)).moved());

        assert_eq!(machine.reset(), Transition::Ignored);
        assert_eq!(machine.phase(), SessionPhase::Succeeded);
        assert_eq!(machine.generation(), generation);
        assert_challenge_invariant(&machine);
    }

    #[test]
    fn test_reset_after_failure_returns_to_idle() {
        let mut machine = counting(PromptKind::Nod);
        let generation = machine.generation();
        while !matches!(machine.on_tick(generation), TickOutcome::Expired(_)) {}
        machine.on_verdict(generation, Err(FlowError::Submission("timeout".into())));

        assert!(machine.reset().moved());
        assert_eq!(machine.phase(), SessionPhase::Idle);
        assert!(machine.generation() > generation);
    }

    #[test]
    fn test_start_while_busy_is_noop() {
        let mut machine = counting(PromptKind::Blink);
        assert_eq!(machine.start().unwrap(), Transition::Ignored);
        assert_eq!(machine.phase(), SessionPhase::Counting);
    }
}
