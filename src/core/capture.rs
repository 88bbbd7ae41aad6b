//! Response capture seam. The flow never interprets captured bytes.

use async_trait::async_trait;

use crate::types::{ChallengeSpec, ObservedResponse};

/// Supplies the user's response once the countdown is over
#[async_trait]
pub trait ResponseCapture: Send + Sync {
    async fn capture(&self, spec: &ChallengeSpec) -> Result<ObservedResponse, String>;
}

/// Returns the placeholder response for every challenge
#[derive(Debug, Default, Clone, Copy)]
pub struct MockCapture;

#[async_trait]
impl ResponseCapture for MockCapture {
    async fn capture(&self, _spec: &ChallengeSpec) -> Result<ObservedResponse, String> {
        Ok(ObservedResponse::placeholder())
    }
}
