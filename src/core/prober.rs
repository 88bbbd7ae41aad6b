//! Capability prober: asks for camera/microphone access once per flow
//!
//! Results are cached for the lifetime of the prober. Any failure (denied,
//! device absent, backend error) folds into [`CapabilityStatus::Denied`].

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::types::{Capability, CapabilitySnapshot, CapabilityStatus};

/// Platform permission prompt
#[async_trait]
pub trait DeviceAccess: Send + Sync {
    /// Ask for access; `Err` carries the platform's reason
    async fn request(&self, capability: Capability) -> Result<(), String>;
}

/// Device access with fixed answers, for simulations and tests
#[derive(Debug, Default)]
pub struct StaticDeviceAccess {
    camera: bool,
    microphone: bool,
    camera_prompts: AtomicUsize,
    microphone_prompts: AtomicUsize,
}

impl StaticDeviceAccess {
    pub fn new(camera: bool, microphone: bool) -> Self {
        Self {
            camera,
            microphone,
            ..Self::default()
        }
    }

    pub fn granting_all() -> Self {
        Self::new(true, true)
    }

    /// How many times the platform prompt was shown for `capability`
    pub fn prompts(&self, capability: Capability) -> usize {
        match capability {
            Capability::Camera => self.camera_prompts.load(Ordering::SeqCst),
            Capability::Microphone => self.microphone_prompts.load(Ordering::SeqCst),
        }
    }
}

#[async_trait]
impl DeviceAccess for StaticDeviceAccess {
    async fn request(&self, capability: Capability) -> Result<(), String> {
        let (granted, counter) = match capability {
            Capability::Camera => (self.camera, &self.camera_prompts),
            Capability::Microphone => (self.microphone, &self.microphone_prompts),
        };
        counter.fetch_add(1, Ordering::SeqCst);
        if granted {
            Ok(())
        } else {
            Err(format!("{capability} permission denied"))
        }
    }
}

/// Caching prober over a [`DeviceAccess`]
pub struct CapabilityProber {
    access: Arc<dyn DeviceAccess>,
    camera: OnceCell<CapabilityStatus>,
    microphone: OnceCell<CapabilityStatus>,
}

impl CapabilityProber {
    pub fn new(access: Arc<dyn DeviceAccess>) -> Self {
        Self {
            access,
            camera: OnceCell::new(),
            microphone: OnceCell::new(),
        }
    }

    /// Probe one capability; the prompt runs at most once
    pub async fn probe(&self, capability: Capability) -> CapabilityStatus {
        let access = &self.access;
        *self
            .cell(capability)
            .get_or_init(|| async move {
                match access.request(capability).await {
                    Ok(()) => {
                        info!(%capability, "access granted");
                        CapabilityStatus::Granted
                    }
                    Err(reason) => {
                        info!(%capability, "access denied");
                        debug!(%capability, %reason, "probe failure");
                        CapabilityStatus::Denied
                    }
                }
            })
            .await
    }

    /// Probe camera and microphone concurrently
    pub async fn probe_all(&self) -> CapabilitySnapshot {
        let (camera, microphone) = tokio::join!(
            self.probe(Capability::Camera),
            self.probe(Capability::Microphone)
        );
        CapabilitySnapshot::new(camera, microphone)
    }

    /// Cached status without probing
    pub fn status(&self, capability: Capability) -> CapabilityStatus {
        self.cell(capability).get().copied().unwrap_or_default()
    }

    pub fn snapshot(&self) -> CapabilitySnapshot {
        CapabilitySnapshot::new(
            self.status(Capability::Camera),
            self.status(Capability::Microphone),
        )
    }

    fn cell(&self, capability: Capability) -> &OnceCell<CapabilityStatus> {
        match capability {
            Capability::Camera => &self.camera,
            Capability::Microphone => &self.microphone,
        }
    }
}
