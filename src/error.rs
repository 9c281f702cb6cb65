//! Error types for video generation and image staging.

use std::time::Duration;

/// Errors that can occur during video generation or image staging.
#[derive(Debug, thiserror::Error)]
pub enum VideogenError {
    /// API key missing or invalid.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Rate limit exceeded.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    /// Polling deadline expired before the job reached a terminal state.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// Invalid request parameters.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Source image failed pre-flight validation.
    #[error("image rejected: {0}")]
    ImageRejected(String),

    /// Network or HTTP error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Object storage error (auth, network, integrity).
    #[error("storage error: {0}")]
    Storage(#[from] object_store::Error),

    /// I/O error (e.g., reading a source file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Response did not match the provider's documented shape, including a
    /// reported success that carries no artifact URL.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// The remote job reached its failure state.
    #[error("video generation failed: {0}")]
    VideoGeneration(String),

    /// Provider name did not match any known kind.
    #[error("invalid provider: {0}")]
    UnknownProvider(String),
}

impl VideogenError {
    /// Whether this failure looks like the connection dropped before any HTTP
    /// status arrived. Such fetches are safe to repeat against idempotent
    /// endpoints.
    pub fn is_connection_drop(&self) -> bool {
        match self {
            Self::Network(e) => {
                e.status().is_none()
                    && !e.is_timeout()
                    && (e.is_connect() || e.is_body() || e.is_request())
            }
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}

/// Result type alias for video generation operations.
pub type Result<T> = std::result::Result<T, VideogenError>;

/// Trims an upstream error body down to something fit for a status line.
///
/// Gateways occasionally answer with full HTML error pages; those are
/// replaced wholesale rather than echoed back to the user.
pub(crate) fn sanitize_error_message(text: &str) -> String {
    let text = text.trim();
    if text.is_empty() {
        return "(empty error body)".to_string();
    }
    if text.to_lowercase().contains("<html") {
        return "upstream returned an HTML error page".to_string();
    }
    const MAX_LEN: usize = 600;
    if text.chars().count() > MAX_LEN {
        let truncated: String = text.chars().take(MAX_LEN).collect();
        format!("{truncated}…")
    } else {
        text.to_string()
    }
}

/// Parses a `Retry-After` header value in seconds, if present.
pub(crate) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}
