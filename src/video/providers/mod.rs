//! Video generation provider adapters.

mod ark;
mod cogvideo;
mod wan;

pub use ark::{ArkProvider, ArkProviderBuilder};
pub use cogvideo::{CogQuality, CogVideoModel, CogVideoProvider, CogVideoProviderBuilder};
pub use wan::{WanModel, WanProvider, WanProviderBuilder};
