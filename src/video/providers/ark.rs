//! Volcengine Ark content generation provider (text/image-to-video).

use crate::error::{parse_retry_after, sanitize_error_message, Result, VideogenError};
use crate::video::poll::{poll_until_terminal, PollState};
use crate::video::provider::VideoProvider;
use crate::video::types::{GeneratedVideo, ProviderKind, VideoGenerationRequest, VideoMetadata};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

const BASE_URL: &str = "https://ark.cn-beijing.volces.com/api/v3";

const DEFAULT_RATIO: &str = "16:9";
const DEFAULT_DURATION_SECS: u32 = 5;

/// Builder for `ArkProvider`.
#[derive(Debug, Clone)]
pub struct ArkProviderBuilder {
    api_key: Option<String>,
    endpoint: Option<String>,
    poll_interval: Duration,
    timeout: Duration,
}

impl Default for ArkProviderBuilder {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: None,
            poll_interval: Duration::from_secs(2),
            timeout: Duration::from_secs(600),
        }
    }
}

impl ArkProviderBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to `ARK_API_KEY` env var.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the Ark inference endpoint id, submitted as the `model` field.
    /// Falls back to `ARK_ENDPOINT` env var.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
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

    /// Builds the provider, resolving credentials.
    pub fn build(self) -> Result<ArkProvider> {
        let api_key = self
            .api_key
            .or_else(|| std::env::var("ARK_API_KEY").ok())
            .ok_or_else(|| {
                VideogenError::Auth("ARK_API_KEY not set and no API key provided".into())
            })?;

        let endpoint = self
            .endpoint
            .or_else(|| std::env::var("ARK_ENDPOINT").ok())
            .ok_or_else(|| {
                VideogenError::Auth("ARK_ENDPOINT not set and no endpoint id provided".into())
            })?;

        Ok(ArkProvider {
            client: reqwest::Client::new(),
            api_key,
            endpoint,
            poll_interval: self.poll_interval,
            timeout: self.timeout,
        })
    }
}

/// Volcengine Ark video generation provider.
#[derive(Debug)]
pub struct ArkProvider {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    poll_interval: Duration,
    timeout: Duration,
}

impl ArkProvider {
    /// Creates a new `ArkProviderBuilder`.
    pub fn builder() -> ArkProviderBuilder {
        ArkProviderBuilder::new()
    }

    /// Submit a video generation task.
    async fn submit(&self, request: &VideoGenerationRequest) -> Result<String> {
        let body = ArkTaskRequest::from_request(request, &self.endpoint)?;
        let url = format!("{}/contents/generations/tasks", BASE_URL);

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

        let submit_response: ArkSubmitResponse = response.json().await?;
        Ok(submit_response.id)
    }

    /// Fetch task status once and map it to a poll state.
    async fn fetch_status(&self, task_id: &str) -> Result<PollState<String>> {
        let url = format!("{}/contents/generations/tasks/{}", BASE_URL, task_id);

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

        let task: ArkTaskResponse = response.json().await?;
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
impl VideoProvider for ArkProvider {
    async fn generate(&self, request: &VideoGenerationRequest) -> Result<GeneratedVideo> {
        let start = Instant::now();

        let task_id = self.submit(request).await?;
        tracing::debug!(task_id = %task_id, "submitted Ark video generation task");

        let video_url = poll_until_terminal(
            || self.fetch_status(&task_id),
            self.poll_interval,
            self.timeout,
        )
        .await?;
        tracing::debug!(url = %video_url, "Ark video generation complete");

        let elapsed_ms = start.elapsed().as_millis() as u64;

        Ok(GeneratedVideo::new(
            video_url,
            ProviderKind::Ark,
            VideoMetadata {
                model: Some(self.endpoint.clone()),
                elapsed_ms: Some(elapsed_ms),
                video_duration_secs: Some(
                    request.duration_secs.unwrap_or(DEFAULT_DURATION_SECS),
                ),
                resolution: None,
            },
        ))
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Ark
    }

    fn requires_image_upload(&self, request: &VideoGenerationRequest) -> bool {
        // Only 5-second generation supports image conditioning.
        request.duration_secs.unwrap_or(DEFAULT_DURATION_SECS) == 5
    }

    async fn health_check(&self) -> Result<()> {
        if self.api_key.is_empty() || self.endpoint.is_empty() {
            Err(VideogenError::Auth("API key or endpoint id is empty".into()))
        } else {
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ArkTaskRequest {
    model: String,
    content: Vec<ArkContentItem>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ArkContentItem {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ArkImageUrl },
}

#[derive(Debug, Serialize)]
struct ArkImageUrl {
    url: String,
}

/// Ark encodes ratio and duration as suffix tokens in the prompt text rather
/// than structured fields.
fn prompt_text(request: &VideoGenerationRequest) -> String {
    let ratio = request.aspect_ratio.as_deref().unwrap_or(DEFAULT_RATIO);
    let duration = request.duration_secs.unwrap_or(DEFAULT_DURATION_SECS);
    format!("{} --ratio {} --dur {}", request.prompt, ratio, duration)
}

impl ArkTaskRequest {
    fn from_request(request: &VideoGenerationRequest, endpoint: &str) -> Result<Self> {
        let duration = request.duration_secs.unwrap_or(DEFAULT_DURATION_SECS);
        if duration != 5 && duration != 10 {
            return Err(VideogenError::InvalidRequest(format!(
                "Ark duration must be 5 or 10 seconds, got {duration}"
            )));
        }
        if duration == 10 && request.source_image_url.is_some() {
            return Err(VideogenError::InvalidRequest(
                "Ark 10-second generation is text-to-video only; drop the source image or use 5 seconds"
                    .into(),
            ));
        }

        let mut content = vec![ArkContentItem::Text {
            text: prompt_text(request),
        }];
        if let Some(url) = &request.source_image_url {
            content.push(ArkContentItem::ImageUrl {
                image_url: ArkImageUrl { url: url.clone() },
            });
        }

        Ok(Self {
            model: endpoint.to_string(),
            content,
        })
    }
}

/// Maps a deserialized task response to a poll state.
///
/// A reported success that carries no non-empty video URL is an
/// `UnexpectedResponse`, never a silent empty result.
fn to_poll_state(task: ArkTaskResponse) -> Result<PollState<String>> {
    match task.status.as_str() {
        "queued" | "running" => Ok(PollState::Pending),
        "succeeded" => task
            .content
            .and_then(|c| c.video_url)
            .filter(|u| !u.is_empty())
            .map(PollState::Succeeded)
            .ok_or_else(|| {
                VideogenError::UnexpectedResponse(
                    "Ark task succeeded but returned no video URL".into(),
                )
            }),
        "failed" => {
            let message = task
                .error
                .map(|e| e.message)
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "task failed".into());
            Ok(PollState::Failed(sanitize_error_message(&message)))
        }
        other => Err(VideogenError::UnexpectedResponse(format!(
            "unknown Ark task status: {other}"
        ))),
    }
}

#[derive(Debug, Deserialize)]
struct ArkSubmitResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ArkTaskResponse {
    status: String,
    #[serde(default)]
    content: Option<ArkTaskContent>,
    #[serde(default)]
    error: Option<ArkApiError>,
}

#[derive(Debug, Deserialize)]
struct ArkTaskContent {
    #[serde(default)]
    video_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArkApiError {
    #[serde(default)]
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_provider() -> ArkProvider {
        ArkProviderBuilder::new()
            .api_key("ark-test-key")
            .endpoint("ep-2026-test")
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_with_explicit_credentials() {
        let provider = test_provider();
        assert_eq!(provider.endpoint, "ep-2026-test");
        assert_eq!(provider.poll_interval, Duration::from_secs(2));
        assert_eq!(provider.timeout, Duration::from_secs(600));
    }

    #[test]
    fn test_builder_missing_credentials() {
        let saved_key = std::env::var("ARK_API_KEY").ok();
        let saved_ep = std::env::var("ARK_ENDPOINT").ok();
        std::env::remove_var("ARK_API_KEY");
        std::env::remove_var("ARK_ENDPOINT");

        let result = ArkProviderBuilder::new().build();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("ARK_API_KEY"));

        let result = ArkProviderBuilder::new().api_key("k").build();
        assert!(result.unwrap_err().to_string().contains("ARK_ENDPOINT"));

        if let Some(val) = saved_key {
            std::env::set_var("ARK_API_KEY", val);
        }
        if let Some(val) = saved_ep {
            std::env::set_var("ARK_ENDPOINT", val);
        }
    }

    #[test]
    fn test_builder_custom_timeouts() {
        let provider = ArkProviderBuilder::new()
            .api_key("k")
            .endpoint("ep")
            .poll_interval(Duration::from_secs(5))
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap();
        assert_eq!(provider.poll_interval, Duration::from_secs(5));
        assert_eq!(provider.timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_prompt_text_suffix_tokens() {
        let req = VideoGenerationRequest::new("a cat running on grass")
            .with_aspect_ratio("16:9")
            .with_duration(5);
        assert_eq!(
            prompt_text(&req),
            "a cat running on grass --ratio 16:9 --dur 5"
        );
    }

    #[test]
    fn test_prompt_text_defaults() {
        let req = VideoGenerationRequest::new("a lighthouse at dusk");
        assert_eq!(
            prompt_text(&req),
            "a lighthouse at dusk --ratio 16:9 --dur 5"
        );
    }

    #[test]
    fn test_request_text_only() {
        let req = VideoGenerationRequest::new("a cat running on grass")
            .with_aspect_ratio("16:9")
            .with_duration(5);
        let body = ArkTaskRequest::from_request(&req, "ep-123").unwrap();

        assert_eq!(body.model, "ep-123");
        let json = serde_json::to_value(&body).unwrap();
        let content = json["content"].as_array().unwrap();
        assert_eq!(content.len(), 1);
        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[0]["text"], "a cat running on grass --ratio 16:9 --dur 5");
    }

    #[test]
    fn test_request_with_image() {
        let req = VideoGenerationRequest::new("animate this")
            .with_duration(5)
            .with_source_image("https://bucket.example/photo.jpg");
        let body = ArkTaskRequest::from_request(&req, "ep-123").unwrap();

        let json = serde_json::to_value(&body).unwrap();
        let content = json["content"].as_array().unwrap();
        assert_eq!(content.len(), 2);
        assert_eq!(content[1]["type"], "image_url");
        assert_eq!(
            content[1]["image_url"]["url"],
            "https://bucket.example/photo.jpg"
        );
    }

    #[test]
    fn test_request_rejects_10s_with_image() {
        let req = VideoGenerationRequest::new("animate this")
            .with_duration(10)
            .with_source_image("https://bucket.example/photo.jpg");
        let err = ArkTaskRequest::from_request(&req, "ep-123").unwrap_err();
        assert!(matches!(err, VideogenError::InvalidRequest(_)));
        assert!(err.to_string().contains("text-to-video only"));
    }

    #[test]
    fn test_request_rejects_unsupported_duration() {
        let req = VideoGenerationRequest::new("too long").with_duration(30);
        let err = ArkTaskRequest::from_request(&req, "ep-123").unwrap_err();
        assert!(matches!(err, VideogenError::InvalidRequest(_)));
    }

    #[test]
    fn test_duration_10_without_image_is_valid() {
        let req = VideoGenerationRequest::new("a long shot").with_duration(10);
        let body = ArkTaskRequest::from_request(&req, "ep-123").unwrap();
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json["content"][0]["text"],
            "a long shot --ratio 16:9 --dur 10"
        );
    }

    #[test]
    fn test_requires_image_upload_only_for_5s() {
        let provider = test_provider();
        let five = VideoGenerationRequest::new("p").with_duration(5);
        let ten = VideoGenerationRequest::new("p").with_duration(10);
        let unset = VideoGenerationRequest::new("p");

        assert!(provider.requires_image_upload(&five));
        assert!(!provider.requires_image_upload(&ten));
        // Default duration is 5.
        assert!(provider.requires_image_upload(&unset));
    }

    #[test]
    fn test_submit_response_deserialization() {
        let json = r#"{"id": "cgt-2026-abc"}"#;
        let resp: ArkSubmitResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.id, "cgt-2026-abc");
    }

    #[test]
    fn test_task_response_running() {
        let json = r#"{"id": "cgt-1", "status": "running"}"#;
        let resp: ArkTaskResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.status, "running");
        assert!(resp.content.is_none());
    }

    #[test]
    fn test_task_response_succeeded() {
        let json = r#"{
            "id": "cgt-1",
            "status": "succeeded",
            "content": {"video_url": "https://cdn.volces.example/v.mp4"}
        }"#;
        let resp: ArkTaskResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.status, "succeeded");
        assert_eq!(
            resp.content.unwrap().video_url.as_deref(),
            Some("https://cdn.volces.example/v.mp4")
        );
    }

    #[test]
    fn test_task_response_failed_with_error() {
        let json = r#"{
            "id": "cgt-1",
            "status": "failed",
            "error": {"code": "InternalError", "message": "gpu pool exhausted"}
        }"#;
        let resp: ArkTaskResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.status, "failed");
        assert_eq!(resp.error.unwrap().message, "gpu pool exhausted");
    }

    fn task_response(json: &str) -> ArkTaskResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_poll_state_running_is_pending() {
        let task = task_response(r#"{"id": "cgt-1", "status": "running"}"#);
        assert_eq!(to_poll_state(task).unwrap(), PollState::Pending);
    }

    #[test]
    fn test_poll_state_succeeded_yields_url() {
        let task = task_response(
            r#"{"id": "cgt-1", "status": "succeeded", "content": {"video_url": "https://cdn.volces.example/v.mp4"}}"#,
        );
        assert_eq!(
            to_poll_state(task).unwrap(),
            PollState::Succeeded("https://cdn.volces.example/v.mp4".into())
        );
    }

    #[test]
    fn test_poll_state_succeeded_without_content_is_error() {
        let task = task_response(r#"{"id": "cgt-1", "status": "succeeded"}"#);
        let err = to_poll_state(task).unwrap_err();
        assert!(matches!(err, VideogenError::UnexpectedResponse(_)));
        assert!(err.to_string().contains("no video URL"));
    }

    #[test]
    fn test_poll_state_succeeded_with_empty_url_is_error() {
        let task = task_response(
            r#"{"id": "cgt-1", "status": "succeeded", "content": {"video_url": ""}}"#,
        );
        let err = to_poll_state(task).unwrap_err();
        assert!(err.to_string().contains("no video URL"));
    }

    #[test]
    fn test_poll_state_failed_carries_message() {
        let task = task_response(
            r#"{"id": "cgt-1", "status": "failed", "error": {"message": "gpu pool exhausted"}}"#,
        );
        assert_eq!(
            to_poll_state(task).unwrap(),
            PollState::Failed("gpu pool exhausted".into())
        );
    }

    #[test]
    fn test_poll_state_failed_without_error_detail() {
        let task = task_response(r#"{"id": "cgt-1", "status": "failed"}"#);
        assert_eq!(to_poll_state(task).unwrap(), PollState::Failed("task failed".into()));
    }

    #[test]
    fn test_poll_state_unknown_status_is_error() {
        let task = task_response(r#"{"id": "cgt-1", "status": "paused"}"#);
        let err = to_poll_state(task).unwrap_err();
        assert!(err.to_string().contains("unknown Ark task status"));
    }

    #[test]
    fn test_parse_error_auth() {
        let provider = test_provider();
        let headers = reqwest::header::HeaderMap::new();
        let err = provider.parse_error(401, "Unauthorized", &headers);
        assert!(matches!(err, VideogenError::Auth(_)));
    }

    #[test]
    fn test_parse_error_invalid_request() {
        let provider = test_provider();
        let headers = reqwest::header::HeaderMap::new();
        let err = provider.parse_error(400, "bad ratio", &headers);
        assert!(matches!(err, VideogenError::InvalidRequest(_)));
    }

    #[test]
    fn test_parse_error_rate_limited_with_hint() {
        let provider = test_provider();
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(reqwest::header::RETRY_AFTER, "7".parse().unwrap());
        let err = provider.parse_error(429, "slow down", &headers);
        match err {
            VideogenError::RateLimited { retry_after } => {
                assert_eq!(retry_after, Some(Duration::from_secs(7)));
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_error_generic() {
        let provider = test_provider();
        let headers = reqwest::header::HeaderMap::new();
        let err = provider.parse_error(500, "boom", &headers);
        assert!(matches!(err, VideogenError::Api { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_health_check() {
        let provider = test_provider();
        assert!(provider.health_check().await.is_ok());

        let empty = ArkProvider {
            client: reqwest::Client::new(),
            api_key: String::new(),
            endpoint: "ep".into(),
            poll_interval: Duration::from_secs(2),
            timeout: Duration::from_secs(600),
        };
        assert!(empty.health_check().await.is_err());
    }
}
