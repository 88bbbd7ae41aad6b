//! Core modules for PoPAI

pub mod api;
pub mod capture;
pub mod countdown;
pub mod flow;
pub mod prober;
pub mod router;
pub mod session;
pub mod submission;
pub mod verifier;

pub use api::{create_router, run_server};
pub use capture::{MockCapture, ResponseCapture};
pub use countdown::{Countdown, CountdownHandle, CountdownScheduler, CountdownStep, CountdownTick};
pub use flow::{ChallengeFlow, FlowHandle};
pub use prober::{CapabilityProber, DeviceAccess, StaticDeviceAccess};
pub use router::{OutcomeRouter, RouteAction};
pub use session::{SessionMachine, SessionState, SubmissionTicket, TickOutcome, Transition};
pub use submission::{SubmissionPipeline, SubmissionReport};
pub use verifier::{verification_hash, HttpVerifier, MockVerifier, TokenMetadata, Verifier};
