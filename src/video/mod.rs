//! Video generation: types, provider trait, and adapters.

pub(crate) mod poll;
pub mod provider;
pub mod providers;
pub mod types;

pub use provider::VideoProvider;
pub use types::{GeneratedVideo, ProviderKind, VideoGenerationRequest, VideoMetadata};
