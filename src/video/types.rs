//! Core types for video generation.

use crate::error::VideogenError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Video provider kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Volcengine Ark content generation.
    Ark,
    /// Tongyi Wanxiang via the DashScope API.
    Wan,
    /// CogVideoX via the Zhipu AI open platform.
    CogVideo,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ark => write!(f, "ark"),
            Self::Wan => write!(f, "wan"),
            Self::CogVideo => write!(f, "cogvideo"),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = VideogenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ark" | "volcengine" => Ok(Self::Ark),
            "wan" | "wanx" | "dashscope" | "tongyi" => Ok(Self::Wan),
            "cogvideo" | "cogvideox" | "zhipu" => Ok(Self::CogVideo),
            other => Err(VideogenError::UnknownProvider(other.to_string())),
        }
    }
}

/// Metadata about the video generation process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoMetadata {
    /// Model used for generation.
    pub model: Option<String>,
    /// Wall-clock time spent from submit to terminal state, in milliseconds.
    pub elapsed_ms: Option<u64>,
    /// Requested video duration in seconds.
    pub video_duration_secs: Option<u32>,
    /// Requested output resolution.
    pub resolution: Option<String>,
}

/// A request to generate a video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoGenerationRequest {
    /// The text prompt describing the desired video.
    pub prompt: String,
    /// Desired video duration in seconds (Ark accepts 5 or 10).
    pub duration_secs: Option<u32>,
    /// Aspect ratio (e.g., "16:9", "9:16").
    pub aspect_ratio: Option<String>,
    /// Output resolution (e.g., "1280*720" for Wan, "1920x1080" for CogVideo).
    pub resolution: Option<String>,
    /// Frame rate (CogVideo only).
    pub fps: Option<u32>,
    /// Whether to generate an audio track (CogVideo only).
    pub with_audio: Option<bool>,
    /// Staged source image URL (for image-to-video).
    pub source_image_url: Option<String>,
}

impl VideoGenerationRequest {
    /// Creates a new request with the given prompt.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            duration_secs: None,
            aspect_ratio: None,
            resolution: None,
            fps: None,
            with_audio: None,
            source_image_url: None,
        }
    }

    /// Sets the desired video duration in seconds.
    pub fn with_duration(mut self, secs: u32) -> Self {
        self.duration_secs = Some(secs);
        self
    }

    /// Sets the aspect ratio.
    pub fn with_aspect_ratio(mut self, ratio: impl Into<String>) -> Self {
        self.aspect_ratio = Some(ratio.into());
        self
    }

    /// Sets the output resolution.
    pub fn with_resolution(mut self, resolution: impl Into<String>) -> Self {
        self.resolution = Some(resolution.into());
        self
    }

    /// Sets the frame rate.
    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = Some(fps);
        self
    }

    /// Enables or disables audio generation.
    pub fn with_audio(mut self, audio: bool) -> Self {
        self.with_audio = Some(audio);
        self
    }

    /// Sets a staged source image URL for image-to-video generation.
    pub fn with_source_image(mut self, url: impl Into<String>) -> Self {
        self.source_image_url = Some(url.into());
        self
    }
}

/// A successfully generated video, identified by its playable URL.
///
/// Providers hand back hosted artifacts; the URL is the contract, nothing is
/// downloaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedVideo {
    /// Playable video URL reported by the provider.
    pub url: String,
    /// Provider that generated this video.
    pub provider: ProviderKind,
    /// Generation metadata.
    pub metadata: VideoMetadata,
}

impl GeneratedVideo {
    /// Creates a new generated video.
    pub fn new(url: impl Into<String>, provider: ProviderKind, metadata: VideoMetadata) -> Self {
        Self {
            url: url.into(),
            provider,
            metadata,
        }
    }
}
