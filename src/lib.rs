#![warn(missing_docs)]
//! VideoGen - AI video generation with image staging.
//!
//! This crate generates videos through three hosted backends (Volcengine
//! Ark, Tongyi Wanxiang, CogVideoX) behind one async trait. Each backend is
//! async on the wire: a request is submitted, its task is polled until it
//! reaches a terminal state, and the hosted video URL is returned. Source
//! images for image-to-video generation are validated and staged in an
//! S3-compatible bucket first, so providers always receive a public URL.
//!
//! # Quick Start
//!
//! ```no_run
//! use videogen::{ArkProvider, VideoGenerationRequest, VideoProvider};
//!
//! #[tokio::main]
//! async fn main() -> videogen::Result<()> {
//!     let provider = ArkProvider::builder().build()?;
//!     let request = VideoGenerationRequest::new("A cat running on grass")
//!         .with_aspect_ratio("16:9")
//!         .with_duration(5);
//!     let video = provider.generate(&request).await?;
//!     println!("{}", video.url);
//!     Ok(())
//! }
//! ```
//!
//! # Dispatching
//!
//! The [`Dispatcher`] bundles all configured providers and the image store
//! and folds every failure into a [`GenerationOutcome`]:
//!
//! ```no_run
//! use videogen::{Dispatcher, ProviderKind, VideoGenerationRequest};
//!
//! #[tokio::main]
//! async fn main() {
//!     let dispatcher = Dispatcher::from_env();
//!     let outcome = dispatcher
//!         .generate(
//!             ProviderKind::Wan,
//!             VideoGenerationRequest::new("A storm over the sea"),
//!             None,
//!         )
//!         .await;
//!     println!("{}: {:?}", outcome.status, outcome.video_url);
//! }
//! ```

mod error;

pub mod dispatch;
pub mod storage;
pub mod validate;
pub mod video;

// Re-export error types at crate root
pub use error::{Result, VideogenError};

pub use dispatch::{Dispatcher, DispatcherBuilder, GenerationOutcome};
pub use storage::{ImageStore, ImageStoreBuilder, UploadedAsset};
pub use validate::validate_image;

// Re-export commonly used video types
pub use video::{
    GeneratedVideo, ProviderKind, VideoGenerationRequest, VideoMetadata, VideoProvider,
};

pub use video::providers::{ArkProvider, ArkProviderBuilder};
pub use video::providers::{CogQuality, CogVideoModel, CogVideoProvider, CogVideoProviderBuilder};
pub use video::providers::{WanModel, WanProvider, WanProviderBuilder};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::dispatch::{Dispatcher, GenerationOutcome};
    pub use crate::error::{Result, VideogenError};
    pub use crate::video::providers::{ArkProvider, CogVideoProvider, WanProvider};
    pub use crate::video::{
        GeneratedVideo, ProviderKind, VideoGenerationRequest, VideoProvider,
    };
}
