//! Device capabilities and their probed availability

use serde::{Deserialize, Serialize};

/// A device permission the flow must acquire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Camera,
    Microphone,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::Camera => write!(f, "camera"),
            Capability::Microphone => write!(f, "microphone"),
        }
    }
}

/// Tri-state availability of one capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityStatus {
    /// Probe has not resolved yet
    #[default]
    Unknown,
    Granted,
    /// Denied, absent or errored - the causes are not distinguished
    Denied,
}

impl CapabilityStatus {
    pub fn is_granted(&self) -> bool {
        *self == CapabilityStatus::Granted
    }
}

/// Read-only snapshot of both capabilities, taken once per flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CapabilitySnapshot {
    pub camera: CapabilityStatus,
    pub microphone: CapabilityStatus,
}

impl CapabilitySnapshot {
    /// Snapshot with both capabilities resolved to the given statuses
    pub fn new(camera: CapabilityStatus, microphone: CapabilityStatus) -> Self {
        Self { camera, microphone }
    }

    /// Both capabilities granted
    pub fn all_granted() -> Self {
        Self::new(CapabilityStatus::Granted, CapabilityStatus::Granted)
    }

    pub fn status(&self, capability: Capability) -> CapabilityStatus {
        match capability {
            Capability::Camera => self.camera,
            Capability::Microphone => self.microphone,
        }
    }

    /// Camera denial blocks the entire flow
    pub fn is_blocked(&self) -> bool {
        self.camera == CapabilityStatus::Denied
    }
}
