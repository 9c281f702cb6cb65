//! Video provider trait.

use crate::error::Result;
use crate::video::types::{GeneratedVideo, ProviderKind, VideoGenerationRequest};
use async_trait::async_trait;

/// Trait for video generation providers.
#[async_trait]
pub trait VideoProvider: Send + Sync {
    /// Generates a video from the given request, blocking until the remote
    /// job reaches a terminal state or the provider's deadline expires.
    async fn generate(&self, request: &VideoGenerationRequest) -> Result<GeneratedVideo>;

    /// Returns the kind of this provider.
    fn kind(&self) -> ProviderKind;

    /// Returns the name of this provider for display.
    fn name(&self) -> &str {
        match self.kind() {
            ProviderKind::Ark => "Volcengine Ark",
            ProviderKind::Wan => "Tongyi Wanxiang (DashScope)",
            ProviderKind::CogVideo => "CogVideoX (Zhipu AI)",
        }
    }

    /// Whether dispatch must stage a supplied source image in object storage
    /// before calling [`generate`](Self::generate).
    ///
    /// Each provider decides from its own configuration and the request; there
    /// is no generic rule.
    fn requires_image_upload(&self, request: &VideoGenerationRequest) -> bool;

    /// Checks that the provider holds plausible credentials.
    async fn health_check(&self) -> Result<()>;
}
