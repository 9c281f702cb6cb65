//! Provider routing and the image staging flow.
//!
//! The dispatcher owns the configured providers and the image store. A
//! generation call never surfaces an error to the caller: every failure is
//! folded into a `GenerationOutcome` with an empty URL and a human-readable
//! status, so downstream consumers only deal with one shape.

use crate::error::Result;
use crate::storage::ImageStore;
use crate::validate::validate_image;
use crate::video::provider::VideoProvider;
use crate::video::types::{ProviderKind, VideoGenerationRequest};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

/// The terminal result of a dispatch call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationOutcome {
    /// Playable video URL, present only on success.
    pub video_url: Option<String>,
    /// Human-readable status line.
    pub status: String,
}

impl GenerationOutcome {
    /// A successful outcome carrying the video URL.
    pub fn success(video_url: impl Into<String>) -> Self {
        Self {
            video_url: Some(video_url.into()),
            status: "task completed".into(),
        }
    }

    /// A failed outcome carrying only a status message.
    pub fn failure(status: impl Into<String>) -> Self {
        Self {
            video_url: None,
            status: status.into(),
        }
    }

    /// Whether this outcome carries a video URL.
    pub fn is_success(&self) -> bool {
        self.video_url.is_some()
    }
}

/// Builder for `Dispatcher`.
#[derive(Default)]
pub struct DispatcherBuilder {
    ark: Option<Arc<dyn VideoProvider>>,
    wan: Option<Arc<dyn VideoProvider>>,
    cog: Option<Arc<dyn VideoProvider>>,
    store: Option<ImageStore>,
}

impl DispatcherBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a provider under the slot its `kind()` reports. A second
    /// provider with the same kind replaces the first.
    pub fn provider(mut self, provider: impl VideoProvider + 'static) -> Self {
        let provider: Arc<dyn VideoProvider> = Arc::new(provider);
        match provider.kind() {
            ProviderKind::Ark => self.ark = Some(provider),
            ProviderKind::Wan => self.wan = Some(provider),
            ProviderKind::CogVideo => self.cog = Some(provider),
        }
        self
    }

    /// Sets the image store used to stage source images.
    pub fn store(mut self, store: ImageStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Finalizes the dispatcher.
    pub fn build(self) -> Dispatcher {
        Dispatcher {
            ark: self.ark,
            wan: self.wan,
            cog: self.cog,
            store: self.store,
        }
    }
}

/// Routes generation requests to the configured providers.
pub struct Dispatcher {
    ark: Option<Arc<dyn VideoProvider>>,
    wan: Option<Arc<dyn VideoProvider>>,
    cog: Option<Arc<dyn VideoProvider>>,
    store: Option<ImageStore>,
}

impl Dispatcher {
    /// Creates a new `DispatcherBuilder`.
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    /// Builds a dispatcher from environment configuration.
    ///
    /// Each backend whose credentials are missing is skipped with a warning
    /// rather than failing the whole dispatcher.
    pub fn from_env() -> Self {
        let mut builder = DispatcherBuilder::new();

        match crate::video::providers::ArkProvider::builder().build() {
            Ok(provider) => builder = builder.provider(provider),
            Err(e) => tracing::warn!(error = %e, "Ark provider not configured"),
        }
        match crate::video::providers::WanProvider::builder().build() {
            Ok(provider) => builder = builder.provider(provider),
            Err(e) => tracing::warn!(error = %e, "Wan provider not configured"),
        }
        match crate::video::providers::CogVideoProvider::builder().build() {
            Ok(provider) => builder = builder.provider(provider),
            Err(e) => tracing::warn!(error = %e, "CogVideoX provider not configured"),
        }
        match ImageStore::builder().build() {
            Ok(store) => builder = builder.store(store),
            Err(e) => tracing::warn!(error = %e, "object storage not configured"),
        }

        builder.build()
    }

    /// The kinds this dispatcher can actually route to.
    pub fn available(&self) -> Vec<ProviderKind> {
        [
            (ProviderKind::Ark, self.ark.is_some()),
            (ProviderKind::Wan, self.wan.is_some()),
            (ProviderKind::CogVideo, self.cog.is_some()),
        ]
        .into_iter()
        .filter_map(|(kind, present)| present.then_some(kind))
        .collect()
    }

    fn provider_for(&self, kind: ProviderKind) -> Option<&Arc<dyn VideoProvider>> {
        match kind {
            ProviderKind::Ark => self.ark.as_ref(),
            ProviderKind::Wan => self.wan.as_ref(),
            ProviderKind::CogVideo => self.cog.as_ref(),
        }
    }

    /// Resolves a provider name (accepting the usual aliases) and dispatches.
    pub async fn generate_named(
        &self,
        name: &str,
        request: VideoGenerationRequest,
        image_path: Option<&Path>,
    ) -> GenerationOutcome {
        match name.parse::<ProviderKind>() {
            Ok(kind) => self.generate(kind, request, image_path).await,
            Err(e) => GenerationOutcome::failure(e.to_string()),
        }
    }

    /// Runs the full flow: optional image staging, then provider dispatch.
    ///
    /// If an image is supplied and the target provider takes one for this
    /// request, the image is validated, uploaded, and its public URL written
    /// into the request before dispatch. A provider that does not take an
    /// image for this request simply ignores the supplied path.
    pub async fn generate(
        &self,
        kind: ProviderKind,
        mut request: VideoGenerationRequest,
        image_path: Option<&Path>,
    ) -> GenerationOutcome {
        let Some(provider) = self.provider_for(kind) else {
            return GenerationOutcome::failure(format!("provider {kind} is not configured"));
        };

        if let Some(path) = image_path {
            if provider.requires_image_upload(&request) {
                match self.stage_image(path).await {
                    Ok(url) => request.source_image_url = Some(url),
                    Err(e) => return GenerationOutcome::failure(e.to_string()),
                }
            } else {
                tracing::debug!(
                    provider = %kind,
                    "request does not take a source image; skipping upload"
                );
            }
        }

        tracing::info!(provider = %provider.name(), "dispatching generation request");
        match provider.generate(&request).await {
            Ok(video) => {
                tracing::info!(provider = %kind, url = %video.url, "generation succeeded");
                GenerationOutcome::success(video.url)
            }
            Err(e) => {
                tracing::error!(provider = %kind, error = %e, "generation failed");
                GenerationOutcome::failure(e.to_string())
            }
        }
    }

    async fn stage_image(&self, path: &Path) -> Result<String> {
        validate_image(path)?;
        let store = self.store.as_ref().ok_or_else(|| {
            crate::error::VideogenError::InvalidRequest(
                "an image was supplied but object storage is not configured".into(),
            )
        })?;
        let asset = store.upload(path).await?;
        Ok(asset.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VideogenError;
    use crate::video::types::{GeneratedVideo, VideoMetadata};
    use async_trait::async_trait;
    use image::{ImageFormat, RgbImage};
    use object_store::memory::InMemory;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct MockProvider {
        kind: ProviderKind,
        takes_image: bool,
        fail_with: Option<String>,
        calls: AtomicUsize,
        seen_image_url: Mutex<Option<String>>,
    }

    impl MockProvider {
        fn new(kind: ProviderKind) -> Self {
            Self {
                kind,
                takes_image: true,
                fail_with: None,
                calls: AtomicUsize::new(0),
                seen_image_url: Mutex::new(None),
            }
        }

        fn text_only(mut self) -> Self {
            self.takes_image = false;
            self
        }

        fn failing(mut self, message: &str) -> Self {
            self.fail_with = Some(message.to_string());
            self
        }
    }

    #[async_trait]
    impl VideoProvider for Arc<MockProvider> {
        async fn generate(&self, request: &VideoGenerationRequest) -> Result<GeneratedVideo> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.seen_image_url.lock().unwrap() = request.source_image_url.clone();
            match &self.fail_with {
                Some(message) => Err(VideogenError::VideoGeneration(message.clone())),
                None => Ok(GeneratedVideo::new(
                    "https://cdn.example/out.mp4",
                    self.kind,
                    VideoMetadata::default(),
                )),
            }
        }

        fn kind(&self) -> ProviderKind {
            self.kind
        }

        fn requires_image_upload(&self, _request: &VideoGenerationRequest) -> bool {
            self.takes_image
        }

        async fn health_check(&self) -> Result<()> {
            Ok(())
        }
    }

    fn memory_dispatcher(provider: Arc<MockProvider>) -> Dispatcher {
        Dispatcher::builder()
            .provider(provider)
            .store(ImageStore::with_backend(
                Arc::new(InMemory::new()),
                "test-bucket",
            ))
            .build()
    }

    fn valid_image(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let path = dir.path().join("frame.png");
        RgbImage::new(640, 360)
            .save_with_format(&path, ImageFormat::Png)
            .unwrap();
        path
    }

    #[test]
    fn test_outcome_constructors() {
        let ok = GenerationOutcome::success("https://cdn.example/v.mp4");
        assert!(ok.is_success());
        assert_eq!(ok.status, "task completed");

        let bad = GenerationOutcome::failure("boom");
        assert!(!bad.is_success());
        assert_eq!(bad.video_url, None);
    }

    #[test]
    fn test_outcome_serialization() {
        let ok = GenerationOutcome::success("https://cdn.example/v.mp4");
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json["video_url"], "https://cdn.example/v.mp4");
        assert_eq!(json["status"], "task completed");
    }

    #[tokio::test]
    async fn test_generate_success() {
        let mock = Arc::new(MockProvider::new(ProviderKind::Ark));
        let dispatcher = memory_dispatcher(mock.clone());

        let outcome = dispatcher
            .generate(ProviderKind::Ark, VideoGenerationRequest::new("a cat"), None)
            .await;

        assert!(outcome.is_success());
        assert_eq!(outcome.video_url.as_deref(), Some("https://cdn.example/out.mp4"));
        assert_eq!(mock.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_generate_unconfigured_provider() {
        let mock = Arc::new(MockProvider::new(ProviderKind::Ark));
        let dispatcher = memory_dispatcher(mock.clone());

        let outcome = dispatcher
            .generate(ProviderKind::Wan, VideoGenerationRequest::new("a cat"), None)
            .await;

        assert!(!outcome.is_success());
        assert!(outcome.status.contains("not configured"));
        assert_eq!(mock.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_generate_provider_failure_becomes_outcome() {
        let mock = Arc::new(MockProvider::new(ProviderKind::Ark).failing("quota exhausted"));
        let dispatcher = memory_dispatcher(mock.clone());

        let outcome = dispatcher
            .generate(ProviderKind::Ark, VideoGenerationRequest::new("a cat"), None)
            .await;

        assert!(!outcome.is_success());
        assert!(outcome.status.contains("quota exhausted"));
        assert_eq!(mock.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_generate_with_image_stages_and_injects_url() {
        let mock = Arc::new(MockProvider::new(ProviderKind::CogVideo));
        let dispatcher = memory_dispatcher(mock.clone());
        let dir = tempfile::tempdir().unwrap();
        let path = valid_image(&dir);

        let outcome = dispatcher
            .generate(
                ProviderKind::CogVideo,
                VideoGenerationRequest::new("animate this"),
                Some(&path),
            )
            .await;

        assert!(outcome.is_success());
        let seen = mock.seen_image_url.lock().unwrap().clone();
        assert_eq!(
            seen.as_deref(),
            Some("https://test-bucket/frame.png"),
            "provider must receive the staged image URL"
        );
    }

    #[tokio::test]
    async fn test_generate_skips_upload_when_provider_does_not_take_image() {
        let mock = Arc::new(MockProvider::new(ProviderKind::Wan).text_only());
        let dispatcher = memory_dispatcher(mock.clone());
        let dir = tempfile::tempdir().unwrap();
        // invalid image on purpose: since the provider does not take one,
        // validation must never run
        let path = dir.path().join("bad.png");
        std::fs::write(&path, b"not an image").unwrap();

        let outcome = dispatcher
            .generate(
                ProviderKind::Wan,
                VideoGenerationRequest::new("a storm"),
                Some(&path),
            )
            .await;

        assert!(outcome.is_success());
        assert_eq!(mock.calls.load(Ordering::SeqCst), 1);
        assert!(mock.seen_image_url.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_generate_rejected_image_never_reaches_provider() {
        let mock = Arc::new(MockProvider::new(ProviderKind::CogVideo));
        let dispatcher = memory_dispatcher(mock.clone());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.png");
        RgbImage::new(100, 100)
            .save_with_format(&path, ImageFormat::Png)
            .unwrap();

        let outcome = dispatcher
            .generate(
                ProviderKind::CogVideo,
                VideoGenerationRequest::new("animate this"),
                Some(&path),
            )
            .await;

        assert!(!outcome.is_success());
        assert!(outcome.status.contains("smallest side"));
        assert_eq!(mock.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_image_without_store_succeeds_when_provider_skips_upload() {
        let mock = Arc::new(MockProvider::new(ProviderKind::Wan).text_only());
        let dispatcher = Dispatcher::builder().provider(mock.clone()).build();
        let dir = tempfile::tempdir().unwrap();
        let path = valid_image(&dir);

        let outcome = dispatcher
            .generate(
                ProviderKind::Wan,
                VideoGenerationRequest::new("a storm"),
                Some(&path),
            )
            .await;

        assert!(outcome.is_success());
        assert_eq!(mock.calls.load(Ordering::SeqCst), 1);
        assert!(mock.seen_image_url.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_generate_image_without_store_fails() {
        let mock = Arc::new(MockProvider::new(ProviderKind::CogVideo));
        let dispatcher = Dispatcher::builder().provider(mock.clone()).build();
        let dir = tempfile::tempdir().unwrap();
        let path = valid_image(&dir);

        let outcome = dispatcher
            .generate(
                ProviderKind::CogVideo,
                VideoGenerationRequest::new("animate this"),
                Some(&path),
            )
            .await;

        assert!(!outcome.is_success());
        assert!(outcome.status.contains("object storage is not configured"));
        assert_eq!(mock.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_generate_named_resolves_aliases() {
        let mock = Arc::new(MockProvider::new(ProviderKind::Wan));
        let dispatcher = memory_dispatcher(mock.clone());

        let outcome = dispatcher
            .generate_named("dashscope", VideoGenerationRequest::new("a cat"), None)
            .await;

        assert!(outcome.is_success());
        assert_eq!(mock.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_generate_named_unknown_provider() {
        let mock = Arc::new(MockProvider::new(ProviderKind::Ark));
        let dispatcher = memory_dispatcher(mock.clone());

        let outcome = dispatcher
            .generate_named("sora", VideoGenerationRequest::new("a cat"), None)
            .await;

        assert!(!outcome.is_success());
        assert!(outcome.status.contains("invalid provider"));
        assert_eq!(mock.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_available_reports_configured_kinds() {
        let dispatcher = Dispatcher::builder()
            .provider(Arc::new(MockProvider::new(ProviderKind::Ark)))
            .provider(Arc::new(MockProvider::new(ProviderKind::CogVideo)))
            .build();

        assert_eq!(
            dispatcher.available(),
            vec![ProviderKind::Ark, ProviderKind::CogVideo]
        );
    }
}
