//! Tongyi Wanxiang video synthesis provider (DashScope API).

use crate::error::{parse_retry_after, sanitize_error_message, Result, VideogenError};
use crate::video::poll::PollState;
use crate::video::provider::VideoProvider;
use crate::video::types::{GeneratedVideo, ProviderKind, VideoGenerationRequest, VideoMetadata};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};

const BASE_URL: &str = "https://dashscope.aliyuncs.com/api/v1";

const DEFAULT_SIZE: &str = "1280*720";

/// Wanxiang 2.1 model variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WanModel {
    /// Text-to-video, turbo tier (default).
    #[default]
    T2vTurbo,
    /// Text-to-video, plus tier.
    T2vPlus,
    /// Image-to-video, turbo tier.
    I2vTurbo,
    /// Image-to-video, plus tier.
    I2vPlus,
}

impl WanModel {
    /// Returns the API model identifier string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::T2vTurbo => "wanx2.1-t2v-turbo",
            Self::T2vPlus => "wanx2.1-t2v-plus",
            Self::I2vTurbo => "wanx2.1-i2v-turbo",
            Self::I2vPlus => "wanx2.1-i2v-plus",
        }
    }

    /// Maps a human-readable label or model id to a variant.
    ///
    /// Unmapped labels fall back to the default `wanx2.1-t2v-turbo` rather
    /// than failing; display labels are a UI concern and never drive
    /// business logic beyond this lookup.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "wanx2.1-t2v-turbo" | "t2v-turbo" | "text-to-video turbo" => Self::T2vTurbo,
            "wanx2.1-t2v-plus" | "t2v-plus" | "text-to-video plus" => Self::T2vPlus,
            "wanx2.1-i2v-turbo" | "i2v-turbo" | "image-to-video turbo" => Self::I2vTurbo,
            "wanx2.1-i2v-plus" | "i2v-plus" | "image-to-video plus" => Self::I2vPlus,
            _ => Self::default(),
        }
    }

    /// Whether this variant conditions generation on a source image.
    pub fn takes_image(&self) -> bool {
        matches!(self, Self::I2vTurbo | Self::I2vPlus)
    }
}

/// Builder for `WanProvider`.
#[derive(Debug, Clone)]
pub struct WanProviderBuilder {
    api_key: Option<String>,
    model: WanModel,
    poll_interval: Duration,
    timeout: Duration,
}

impl Default for WanProviderBuilder {
    fn default() -> Self {
        Self {
            api_key: None,
            model: WanModel::default(),
            poll_interval: Duration::from_secs(2),
            timeout: Duration::from_secs(600),
        }
    }
}

impl WanProviderBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to `DASHSCOPE_API_KEY` env var.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the Wanxiang model variant.
    pub fn model(mut self, model: WanModel) -> Self {
        self.model = model;
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
    pub fn build(self) -> Result<WanProvider> {
        let api_key = self
            .api_key
            .or_else(|| std::env::var("DASHSCOPE_API_KEY").ok())
            .ok_or_else(|| {
                VideogenError::Auth("DASHSCOPE_API_KEY not set and no API key provided".into())
            })?;

        Ok(WanProvider {
            client: reqwest::Client::new(),
            api_key,
            model: self.model,
            poll_interval: self.poll_interval,
            timeout: self.timeout,
        })
    }
}

/// Tongyi Wanxiang video generation provider.
#[derive(Debug)]
pub struct WanProvider {
    client: reqwest::Client,
    api_key: String,
    model: WanModel,
    poll_interval: Duration,
    timeout: Duration,
}

impl WanProvider {
    /// Creates a new `WanProviderBuilder`.
    pub fn builder() -> WanProviderBuilder {
        WanProviderBuilder::new()
    }

    /// Returns the configured model variant.
    pub fn model(&self) -> WanModel {
        self.model
    }

    /// Submit an asynchronous video synthesis task.
    async fn submit(&self, request: &VideoGenerationRequest) -> Result<String> {
        let body = WanSynthesisRequest::from_request(request, self.model);
        let url = format!("{}/services/aigc/video-generation/video-synthesis", BASE_URL);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("X-DashScope-Async", "enable")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(self.parse_error(status.as_u16(), &text, &headers));
        }

        let submit_response: WanSubmitResponse = response.json().await?;
        Ok(submit_response.output.task_id)
    }

    /// Fetch the task once.
    async fn fetch_task(&self, url: &str) -> Result<WanTaskOutput> {
        let response = self
            .client
            .get(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(self.parse_error(status.as_u16(), &text, &headers));
        }

        let task: WanTaskResponse = response.json().await?;
        Ok(task.output)
    }

    /// Poll until the task is terminal, returning the video URL.
    async fn poll_until_ready(&self, task_id: &str) -> Result<String> {
        let url = format!("{}/tasks/{}", BASE_URL, task_id);
        poll_for_video(|| self.fetch_task(&url), self.poll_interval, self.timeout).await
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
        if status == 400 {
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

/// Drives `fetch` at a fixed interval until the task is terminal.
///
/// DashScope occasionally drops the connection right after a job completes.
/// The status endpoint is idempotent, so a connection-class error triggers
/// exactly one immediate re-fetch per iteration; any other failure, or a
/// second consecutive drop, propagates as a polling failure.
async fn poll_for_video<F, Fut>(
    mut fetch: F,
    interval: Duration,
    timeout: Duration,
) -> Result<String>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<WanTaskOutput>>,
{
    let start = Instant::now();

    loop {
        if start.elapsed() > timeout {
            return Err(VideogenError::Timeout(timeout));
        }

        let output = match fetch().await {
            Ok(output) => output,
            Err(e) if e.is_connection_drop() => {
                tracing::debug!(
                    error = %e,
                    "connection dropped during status fetch, re-fetching once"
                );
                fetch().await?
            }
            Err(e) => return Err(e),
        };

        match to_poll_state(output)? {
            PollState::Pending => {
                tracing::debug!(
                    elapsed_secs = start.elapsed().as_secs(),
                    "polling Wanxiang video synthesis"
                );
                tokio::time::sleep(interval).await;
            }
            PollState::Succeeded(url) => return Ok(url),
            PollState::Failed(message) => return Err(VideogenError::VideoGeneration(message)),
        }
    }
}

/// Maps a fetched task output to a poll state.
///
/// A reported success without a non-empty video URL is an
/// `UnexpectedResponse`.
fn to_poll_state(output: WanTaskOutput) -> Result<PollState<String>> {
    match output.task_status.as_str() {
        "PENDING" | "RUNNING" => Ok(PollState::Pending),
        "SUCCEEDED" => output
            .video_url
            .filter(|u| !u.is_empty())
            .map(PollState::Succeeded)
            .ok_or_else(|| {
                VideogenError::UnexpectedResponse(
                    "Wanxiang task succeeded but returned no video URL".into(),
                )
            }),
        "FAILED" => {
            let message = output
                .message
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "task failed".into());
            Ok(PollState::Failed(sanitize_error_message(&message)))
        }
        other => Err(VideogenError::UnexpectedResponse(format!(
            "unknown Wanxiang task status: {other}"
        ))),
    }
}

#[async_trait]
impl VideoProvider for WanProvider {
    async fn generate(&self, request: &VideoGenerationRequest) -> Result<GeneratedVideo> {
        let start = Instant::now();

        let task_id = self.submit(request).await?;
        tracing::debug!(task_id = %task_id, model = %self.model.as_str(), "submitted Wanxiang synthesis task");

        let video_url = self.poll_until_ready(&task_id).await?;
        tracing::debug!(url = %video_url, "Wanxiang video synthesis complete");

        let elapsed_ms = start.elapsed().as_millis() as u64;

        Ok(GeneratedVideo::new(
            video_url,
            ProviderKind::Wan,
            VideoMetadata {
                model: Some(self.model.as_str().to_string()),
                elapsed_ms: Some(elapsed_ms),
                video_duration_secs: request.duration_secs,
                resolution: Some(
                    request
                        .resolution
                        .clone()
                        .unwrap_or_else(|| DEFAULT_SIZE.to_string()),
                ),
            },
        ))
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Wan
    }

    fn requires_image_upload(&self, _request: &VideoGenerationRequest) -> bool {
        self.model.takes_image()
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
struct WanSynthesisRequest {
    model: String,
    input: WanInput,
    parameters: WanParameters,
}

#[derive(Debug, Serialize)]
struct WanInput {
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    img_url: Option<String>,
}

#[derive(Debug, Serialize)]
struct WanParameters {
    size: String,
}

impl WanSynthesisRequest {
    fn from_request(request: &VideoGenerationRequest, model: WanModel) -> Self {
        Self {
            model: model.as_str().to_string(),
            input: WanInput {
                prompt: request.prompt.clone(),
                img_url: request.source_image_url.clone(),
            },
            parameters: WanParameters {
                size: request
                    .resolution
                    .clone()
                    .unwrap_or_else(|| DEFAULT_SIZE.to_string()),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct WanSubmitResponse {
    output: WanSubmitOutput,
}

#[derive(Debug, Deserialize)]
struct WanSubmitOutput {
    task_id: String,
}

#[derive(Debug, Deserialize)]
struct WanTaskResponse {
    output: WanTaskOutput,
}

#[derive(Debug, Deserialize)]
struct WanTaskOutput {
    task_status: String,
    #[serde(default)]
    video_url: Option<String>,
    #[serde(default)]
    message: Option<String>,
}
