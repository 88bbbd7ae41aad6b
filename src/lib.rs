//! PoPAI: client-side liveness challenge flow
//!
//! Capability probe → challenge issuance → countdown → submission → outcome.
//! The verifier is an external collaborator reached through [`core::Verifier`].

pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod types;

pub use config::FlowConfig;
pub use error::{ConfigError, FlowError, VerifierError};

// =============================================================================
// TIMING
// =============================================================================

/// Countdown tick period (milliseconds)
pub const TICK_INTERVAL_MS: u64 = 1000;

/// Delay between a successful verification and the exit signal (milliseconds)
pub const SUCCESS_EXIT_DELAY_MS: u64 = 2000;

/// Verifier request timeout (milliseconds)
pub const VERIFIER_TIMEOUT_MS: u64 = 10_000;

// =============================================================================
// CHALLENGE DURATIONS
// =============================================================================

/// Seconds allotted to spoken challenges
pub const SPOKEN_CHALLENGE_SECS: u32 = 7;

/// Seconds allotted to every other challenge
pub const DEFAULT_CHALLENGE_SECS: u32 = 5;

// =============================================================================
// PLACEHOLDER CAPTURE
// =============================================================================

/// Opaque response bytes used when no real capture device is attached
pub const PLACEHOLDER_RESPONSE_BYTES: [u8; 4] = [1, 2, 3, 4];

/// Reaction time reported by the placeholder behavioural signal (milliseconds)
pub const PLACEHOLDER_REACTION_TIME_MS: u64 = 500;

// =============================================================================
// MOCK VERIFIER
// =============================================================================

/// Default probability that a well-formed response passes mock verification
pub const MOCK_PASS_RATE: f64 = 0.7;

/// Seconds an issued challenge stays valid in the mock verifier
pub const CHALLENGE_TTL_SECS: u64 = 300;

/// Prefix for tokens minted by the mock verifier
pub const TOKEN_PREFIX: &str = "POP";

// =============================================================================
// VERSION
// =============================================================================

pub const VERSION: &str = "1.0.0";
