//! Flow driver: one task owns the session and serialises every event
//!
//! Commands, countdown ticks, verifier replies and the exit timer all arrive
//! on one channel. Each async source tags its event with the generation it was
//! started under, so replies that outlive their episode are dropped by the
//! session instead of racing it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::config::FlowConfig;
use crate::core::capture::ResponseCapture;
use crate::core::countdown::{CountdownHandle, CountdownScheduler, CountdownTick};
use crate::core::prober::{CapabilityProber, DeviceAccess};
use crate::core::router::{OutcomeRouter, RouteAction};
use crate::core::session::{SessionMachine, SessionState, SubmissionTicket, TickOutcome, Transition};
use crate::core::submission::{SubmissionPipeline, SubmissionReport};
use crate::core::verifier::Verifier;
use crate::error::{FlowError, VerifierError};
use crate::types::{Capability, CapabilitySnapshot, FlowUpdate, IssuedChallenge, ReasonCode, SessionPhase};

/// Buffered updates per subscriber before the slowest one starts lagging
const UPDATE_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlowCommand {
    Start,
    Retry,
    Reset,
}

#[derive(Debug)]
enum FlowEvent {
    Command(FlowCommand),
    Tick(CountdownTick),
    Issued {
        generation: u64,
        result: Result<IssuedChallenge, VerifierError>,
    },
    Submitted(SubmissionReport),
    ExitDue {
        generation: u64,
    },
}

impl From<CountdownTick> for FlowEvent {
    fn from(tick: CountdownTick) -> Self {
        FlowEvent::Tick(tick)
    }
}

/// A configured flow that has not started yet
pub struct ChallengeFlow {
    config: FlowConfig,
    prober: Arc<CapabilityProber>,
    verifier: Arc<dyn Verifier>,
    pipeline: SubmissionPipeline,
    updates: broadcast::Sender<FlowUpdate>,
}

impl ChallengeFlow {
    pub fn new(
        config: FlowConfig,
        access: Arc<dyn DeviceAccess>,
        verifier: Arc<dyn Verifier>,
        capture: Arc<dyn ResponseCapture>,
    ) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CAPACITY);
        Self {
            config,
            prober: Arc::new(CapabilityProber::new(access)),
            pipeline: SubmissionPipeline::new(verifier.clone(), capture),
            verifier,
            updates,
        }
    }

    /// Subscribe before [`spawn`](Self::spawn) to observe the capability probe
    pub fn subscribe(&self) -> broadcast::Receiver<FlowUpdate> {
        self.updates.subscribe()
    }

    /// Probe capabilities and start serving commands
    pub fn spawn(self) -> FlowHandle {
        let ChallengeFlow {
            config,
            prober,
            verifier,
            pipeline,
            updates,
        } = self;
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (phase_tx, phase_rx) = watch::channel(SessionPhase::Idle);
        let cancel = CancellationToken::new();

        let commands = events_tx.clone();
        let handle_updates = updates.clone();
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            publish(&updates, &phase_tx, FlowUpdate::new(SessionPhase::Idle, ReasonCode::R001_PROBING));

            let capabilities = tokio::select! {
                _ = token.cancelled() => return SessionPhase::Idle,
                snapshot = prober.probe_all() => snapshot,
            };

            let mut driver = FlowDriver {
                machine: SessionMachine::new(capabilities),
                router: OutcomeRouter::new(config.success_exit_delay()),
                scheduler: CountdownScheduler::new(config.tick_interval()),
                verifier,
                pipeline,
                events: events_tx,
                updates,
                phase: phase_tx,
                cancel: token,
                countdown: None,
            };
            driver.announce(capabilities);
            driver.run(events_rx).await
        });

        FlowHandle {
            commands,
            updates: handle_updates,
            phase: phase_rx,
            cancel,
            task: Some(task),
        }
    }
}

/// Control surface of a running flow. Dropping it tears the flow down.
pub struct FlowHandle {
    commands: mpsc::UnboundedSender<FlowEvent>,
    updates: broadcast::Sender<FlowUpdate>,
    phase: watch::Receiver<SessionPhase>,
    cancel: CancellationToken,
    task: Option<JoinHandle<SessionPhase>>,
}

impl FlowHandle {
    /// Request a new verification attempt
    pub fn start(&self) -> bool {
        self.commands.send(FlowEvent::Command(FlowCommand::Start)).is_ok()
    }

    /// Request retry after a failure; a no-op in any other phase
    pub fn retry(&self) -> bool {
        self.commands.send(FlowEvent::Command(FlowCommand::Retry)).is_ok()
    }

    /// Abandon the current attempt and return to IDLE
    pub fn reset(&self) -> bool {
        self.commands.send(FlowEvent::Command(FlowCommand::Reset)).is_ok()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FlowUpdate> {
        self.updates.subscribe()
    }

    /// Phase after the last processed event
    pub fn phase(&self) -> SessionPhase {
        *self.phase.borrow()
    }

    /// Wait until the flow reaches `phase`
    pub async fn wait_for(&mut self, phase: SessionPhase) -> bool {
        self.phase.wait_for(|current| *current == phase).await.is_ok()
    }

    /// Cancel pending timers and replies, then return the final phase
    pub async fn shutdown(mut self) -> Result<SessionPhase, JoinError> {
        self.cancel.cancel();
        match self.task.take() {
            Some(task) => task.await,
            None => Ok(self.phase()),
        }
    }
}

impl Drop for FlowHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn publish(
    updates: &broadcast::Sender<FlowUpdate>,
    phase: &watch::Sender<SessionPhase>,
    update: FlowUpdate,
) {
    debug!(phase = %update.phase, reason = update.reason.code(), "flow update");
    phase.send_replace(update.phase);
    // no subscribers is fine
    let _ = updates.send(update);
}

struct FlowDriver {
    machine: SessionMachine,
    router: OutcomeRouter,
    scheduler: CountdownScheduler,
    verifier: Arc<dyn Verifier>,
    pipeline: SubmissionPipeline,
    events: mpsc::UnboundedSender<FlowEvent>,
    updates: broadcast::Sender<FlowUpdate>,
    phase: watch::Sender<SessionPhase>,
    cancel: CancellationToken,
    countdown: Option<CountdownHandle>,
}

impl FlowDriver {
    async fn run(mut self, mut events: mpsc::UnboundedReceiver<FlowEvent>) -> SessionPhase {
        loop {
            let event = tokio::select! {
                _ = self.cancel.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };
            self.handle(event);
        }

        self.machine.invalidate();
        self.countdown = None;
        info!(phase = %self.machine.phase(), "flow stopped");
        self.machine.phase()
    }

    fn handle(&mut self, event: FlowEvent) {
        match event {
            FlowEvent::Command(FlowCommand::Start) => self.on_start(),
            FlowEvent::Command(FlowCommand::Retry) => self.on_retry(),
            FlowEvent::Command(FlowCommand::Reset) => self.on_reset(),
            FlowEvent::Tick(tick) => self.on_tick(tick.generation),
            FlowEvent::Issued { generation, result } => self.on_issued(generation, result),
            FlowEvent::Submitted(report) => self.on_submitted(report),
            FlowEvent::ExitDue { generation } => self.on_exit_due(generation),
        }
    }

    fn announce(&mut self, capabilities: CapabilitySnapshot) {
        let update = if !capabilities.camera.is_granted() {
            FlowUpdate::new(SessionPhase::Idle, ReasonCode::R001_CAMERA_DENIED)
                .with_message(FlowError::CapabilityDenied(Capability::Camera).user_message())
        } else {
            FlowUpdate::new(SessionPhase::Idle, ReasonCode::R001_CAMERA_GRANTED)
        };
        self.emit(update);
    }

    fn on_start(&mut self) {
        match self.machine.start() {
            Ok(Transition::Moved { .. }) => {
                self.emit(FlowUpdate::new(
                    SessionPhase::AwaitingChallenge,
                    ReasonCode::R002_STATE_AWAITING,
                ));
                self.spawn_issuance();
            }
            Ok(Transition::Ignored) => trace!("start ignored"),
            Err(error) => self.emit(
                FlowUpdate::new(self.machine.phase(), ReasonCode::R005_START_REJECTED)
                    .with_message(error.user_message()),
            ),
        }
    }

    fn on_retry(&mut self) {
        if self.router.retry(&mut self.machine).moved() {
            self.countdown = None;
            self.emit(FlowUpdate::new(SessionPhase::Idle, ReasonCode::R005_RETRY));
        }
    }

    fn on_reset(&mut self) {
        if self.machine.reset().moved() {
            self.countdown = None;
            self.emit(FlowUpdate::new(SessionPhase::Idle, ReasonCode::R005_RESET));
        }
    }

    fn on_issued(&mut self, generation: u64, result: Result<IssuedChallenge, VerifierError>) {
        let applied = match result {
            Ok(issued) => self.machine.on_challenge_issued(generation, issued),
            Err(error) => self.machine.on_issuance_failed(generation, error),
        };
        match applied {
            Ok(Transition::Moved { .. }) => {
                let remaining = self.machine.remaining().unwrap_or_default();
                self.emit(self.counting_update(ReasonCode::R002_STATE_COUNTING, remaining));
                self.countdown = Some(self.scheduler.schedule(
                    self.machine.generation(),
                    remaining,
                    self.events.clone(),
                ));
            }
            Ok(Transition::Ignored) => debug!(
                generation,
                reason = ReasonCode::R004_STALE_REPLY.code(),
                "challenge reply discarded"
            ),
            Err(error) => self.emit(
                FlowUpdate::new(self.machine.phase(), error.reason())
                    .with_message(error.user_message()),
            ),
        }
    }

    fn on_tick(&mut self, generation: u64) {
        match self.machine.on_tick(generation) {
            TickOutcome::Remaining(remaining) => {
                self.emit(self.counting_update(ReasonCode::R003_TICK, remaining));
            }
            TickOutcome::Expired(ticket) => {
                self.countdown = None;
                let mut update = FlowUpdate::new(SessionPhase::Submitting, ReasonCode::R003_REACHED_ZERO)
                    .with_countdown(0);
                if let Some(spec) = self.machine.challenge() {
                    update = update.with_prompt(spec.prompt_text.clone());
                }
                self.emit(update);
                self.spawn_submission(ticket);
            }
            TickOutcome::Ignored(reason) => trace!(generation, reason = reason.code(), "tick ignored"),
        }
    }

    fn on_submitted(&mut self, report: SubmissionReport) {
        let generation = report.generation;
        if !self.machine.on_verdict(generation, report.verdict).moved() {
            debug!(
                generation,
                challenge = %report.challenge_id,
                reason = ReasonCode::R004_STALE_REPLY.code(),
                "verdict discarded"
            );
            return;
        }

        match self.router.route(&self.machine) {
            RouteAction::ScheduleExit { generation, delay } => {
                let mut update = FlowUpdate::new(SessionPhase::Succeeded, ReasonCode::R004_VERIFIED);
                if let SessionState::Succeeded { outcome, .. } = self.machine.state() {
                    if let Some(token) = &outcome.nft_id {
                        update = update.with_message(format!("Proof of personhood token {token}"));
                    }
                }
                self.emit(update);
                self.spawn_exit_timer(generation, delay);
            }
            RouteAction::OfferRetry { message } => {
                let reason = match self.machine.state() {
                    SessionState::Failed { error, .. } => error.reason(),
                    _ => ReasonCode::R002_STATE_FAILED,
                };
                self.emit(FlowUpdate::new(SessionPhase::Failed, reason).with_message(message));
            }
            RouteAction::None => {}
        }
    }

    fn on_exit_due(&mut self, generation: u64) {
        if self.router.on_exit_due(generation, &self.machine) {
            self.emit(
                FlowUpdate::new(SessionPhase::Succeeded, ReasonCode::R005_EXIT_SIGNALLED).with_exit(),
            );
        }
    }

    fn spawn_issuance(&self) {
        let generation = self.machine.generation();
        let verifier = self.verifier.clone();
        let events = self.events.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            let result = tokio::select! {
                _ = cancel.cancelled() => return,
                result = verifier.issue_challenge() => result,
            };
            let _ = events.send(FlowEvent::Issued { generation, result });
        });
    }

    fn spawn_submission(&self, ticket: SubmissionTicket) {
        let pipeline = self.pipeline.clone();
        let events = self.events.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            let report = tokio::select! {
                _ = cancel.cancelled() => return,
                report = pipeline.submit(ticket) => report,
            };
            let _ = events.send(FlowEvent::Submitted(report));
        });
    }

    fn spawn_exit_timer(&self, generation: u64, delay: Duration) {
        let events = self.events.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let _ = events.send(FlowEvent::ExitDue { generation });
                }
            }
        });
    }

    fn counting_update(&self, reason: ReasonCode, remaining: u32) -> FlowUpdate {
        let update = FlowUpdate::new(SessionPhase::Counting, reason).with_countdown(remaining);
        match self.machine.challenge() {
            Some(spec) => update.with_prompt(spec.prompt_text.clone()),
            None => update,
        }
    }

    fn emit(&self, update: FlowUpdate) {
        publish(&self.updates, &self.phase, update);
    }
}
