//! CogVideoX video generation provider (Zhipu AI open platform).

use crate::error::{parse_retry_after, sanitize_error_message, Result, VideogenError};
use crate::video::poll::{poll_until_terminal, PollState};
use crate::video::provider::VideoProvider;
use crate::video::types::{GeneratedVideo, ProviderKind, VideoGenerationRequest, VideoMetadata};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

const BASE_URL: &str = "https://open.bigmodel.cn/api/paas/v4";

const DEFAULT_SIZE: &str = "1920x1080";
const DEFAULT_FPS: u32 = 30;

/// CogVideoX model variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CogVideoModel {
    /// CogVideoX-2 (default).
    #[default]
    CogVideoX2,
    /// CogVideoX-Flash — faster, but resolution and frame rate are fixed by
    /// the backend and cannot be requested.
    CogVideoXFlash,
}

impl CogVideoModel {
    /// Returns the API model identifier string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CogVideoX2 => "cogvideox-2",
            Self::CogVideoXFlash => "cogvideox-flash",
        }
    }

    /// Whether this variant accepts resolution and frame-rate parameters.
    fn supports_output_controls(&self) -> bool {
        !matches!(self, Self::CogVideoXFlash)
    }
}

/// Generation quality mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CogQuality {
    /// Prioritize generation speed (default).
    #[default]
    Speed,
    /// Prioritize output quality.
    Quality,
}

impl CogQuality {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Speed => "speed",
            Self::Quality => "quality",
        }
    }
}

/// Builder for `CogVideoProvider`.
#[derive(Debug, Clone)]
pub struct CogVideoProviderBuilder {
    api_key: Option<String>,
    model: CogVideoModel,
    quality: CogQuality,
    poll_interval: Duration,
    timeout: Duration,
}

impl Default for CogVideoProviderBuilder {
    fn default() -> Self {
        Self {
            api_key: None,
            model: CogVideoModel::default(),
            quality: CogQuality::default(),
            poll_interval: Duration::from_secs(2),
            timeout: Duration::from_secs(600),
        }
    }
}

impl CogVideoProviderBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to `ZHIPUAI_API_KEY` env var.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the CogVideoX model variant.
    pub fn model(mut self, model: CogVideoModel) -> Self {
        self.model = model;
        self
    }

    /// Sets the quality mode.
    pub fn quality(mut self, quality: CogQuality) -> Self {
        self.quality = quality;
        self
    }

    /// Sets the polling interval for async generation.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the maximum time to wait for generation.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the provider, resolving the API key.
    pub fn build(self) -> Result<CogVideoProvider> {
        let api_key = self
            .api_key
            .or_else(|| std::env::var("ZHIPUAI_API_KEY").ok())
            .ok_or_else(|| {
                VideogenError::Auth("ZHIPUAI_API_KEY not set and no API key provided".into())
            })?;

        Ok(CogVideoProvider {
            client: reqwest::Client::new(),
            api_key,
            model: self.model,
            quality: self.quality,
            poll_interval: self.poll_interval,
            timeout: self.timeout,
        })
    }
}

/// CogVideoX video generation provider.
#[derive(Debug)]
pub struct CogVideoProvider {
    client: reqwest::Client,
    api_key: String,
    model: CogVideoModel,
    quality: CogQuality,
    poll_interval: Duration,
    timeout: Duration,
}

impl CogVideoProvider {
    /// Creates a new `CogVideoProviderBuilder`.
    pub fn builder() -> CogVideoProviderBuilder {
        CogVideoProviderBuilder::new()
    }

    /// Submit a video generation request.
    async fn submit(&self, request: &VideoGenerationRequest) -> Result<String> {
        let body = CogGenerationRequest::from_request(request, self.model, self.quality);
        let url = format!("{}/videos/generations", BASE_URL);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(self.parse_error(status.as_u16(), &text, &headers));
        }

        let submit_response: CogSubmitResponse = response.json().await?;
        Ok(submit_response.id)
    }

    /// Fetch task status once and map it to a poll state.
    async fn fetch_status(&self, task_id: &str) -> Result<PollState<String>> {
        let url = format!("{}/async-result/{}", BASE_URL, task_id);

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(self.parse_error(status.as_u16(), &text, &headers));
        }

        let task: CogResultResponse = response.json().await?;
        to_poll_state(task)
    }

    fn parse_error(
        &self,
        status: u16,
        text: &str,
        headers: &reqwest::header::HeaderMap,
    ) -> VideogenError {
        let text = sanitize_error_message(text);
        if status == 401 || status == 403 {
            return VideogenError::Auth(text);
        }
        if status == 400 || status == 422 {
            return VideogenError::InvalidRequest(text);
        }
        if status == 429 {
            let retry_after = parse_retry_after(headers).map(Duration::from_secs);
            return VideogenError::RateLimited { retry_after };
        }
        VideogenError::Api {
            status,
            message: text,
        }
    }
}

#[async_trait]
impl VideoProvider for CogVideoProvider {
    async fn generate(&self, request: &VideoGenerationRequest) -> Result<GeneratedVideo> {
        let start = Instant::now();

        let task_id = self.submit(request).await?;
        tracing::debug!(task_id = %task_id, model = %self.model.as_str(), "submitted CogVideoX generation request");

        let video_url = poll_until_terminal(
            || self.fetch_status(&task_id),
            self.poll_interval,
            self.timeout,
        )
        .await?;
        tracing::debug!(url = %video_url, "CogVideoX video generation complete");

        let elapsed_ms = start.elapsed().as_millis() as u64;

        Ok(GeneratedVideo::new(
            video_url,
            ProviderKind::CogVideo,
            VideoMetadata {
                model: Some(self.model.as_str().to_string()),
                elapsed_ms: Some(elapsed_ms),
                video_duration_secs: request.duration_secs,
                resolution: self
                    .model
                    .supports_output_controls()
                    .then(|| {
                        request
                            .resolution
                            .clone()
                            .unwrap_or_else(|| DEFAULT_SIZE.to_string())
                    }),
            },
        ))
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::CogVideo
    }

    fn requires_image_upload(&self, _request: &VideoGenerationRequest) -> bool {
        // The backend accepts image_url on every model; any supplied image
        // is staged.
        true
    }

    async fn health_check(&self) -> Result<()> {
        if self.api_key.is_empty() {
            Err(VideogenError::Auth("API key is empty".into()))
        } else {
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct CogGenerationRequest {
    model: String,
    prompt: String,
    quality: String,
    with_audio: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fps: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_url: Option<String>,
}

impl CogGenerationRequest {
    fn from_request(
        request: &VideoGenerationRequest,
        model: CogVideoModel,
        quality: CogQuality,
    ) -> Self {
        // Flash has fewer controllable parameters: size and fps are omitted.
        let (size, fps) = if model.supports_output_controls() {
            (
                Some(
                    request
                        .resolution
                        .clone()
                        .unwrap_or_else(|| DEFAULT_SIZE.to_string()),
                ),
                Some(request.fps.unwrap_or(DEFAULT_FPS)),
            )
        } else {
            (None, None)
        };

        Self {
            model: model.as_str().to_string(),
            prompt: request.prompt.clone(),
            quality: quality.as_str().to_string(),
            with_audio: request.with_audio.unwrap_or(false),
            size,
            fps,
            image_url: request.source_image_url.clone(),
        }
    }
}

/// Maps a deserialized async-result response to a poll state.
///
/// A reported success with no extractable video URL (missing result, empty
/// collection, or empty URL) is an `UnexpectedResponse`.
fn to_poll_state(task: CogResultResponse) -> Result<PollState<String>> {
    match task.task_status.as_str() {
        "PROCESSING" => Ok(PollState::Pending),
        "SUCCESS" => task
            .video_result
            .and_then(CogVideoResult::into_first_url)
            .map(PollState::Succeeded)
            .ok_or_else(|| {
                VideogenError::UnexpectedResponse(
                    "CogVideoX task succeeded but returned no video URL".into(),
                )
            }),
        "FAIL" => Ok(PollState::Failed("task failed".into())),
        other => Err(VideogenError::UnexpectedResponse(format!(
            "unknown CogVideoX task status: {other}"
        ))),
    }
}

#[derive(Debug, Deserialize)]
struct CogSubmitResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CogResultResponse {
    task_status: String,
    #[serde(default)]
    video_result: Option<CogVideoResult>,
}

/// The result field is polymorphic: a single url-bearing object or a
/// non-empty ordered list of them.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CogVideoResult {
    Collection(Vec<CogVideoArtifact>),
    Single(CogVideoArtifact),
}

impl CogVideoResult {
    /// Extracts the playable URL: the single object's, or the first
    /// element's for a collection.
    fn into_first_url(self) -> Option<String> {
        match self {
            Self::Single(artifact) => Some(artifact.url).filter(|u| !u.is_empty()),
            Self::Collection(artifacts) => artifacts
                .into_iter()
                .next()
                .map(|a| a.url)
                .filter(|u| !u.is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CogVideoArtifact {
    url: String,
}
