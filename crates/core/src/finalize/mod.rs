//! Merge, encode and placement of acquired episodes.

mod error;
mod ffmpeg;
mod mover;
mod stage;
mod traits;
mod types;

pub use error::FinalizeError;
pub use ffmpeg::FfmpegFinalizer;
pub use mover::FileMover;
pub use stage::FinalizationStage;
pub use traits::Finalizer;
pub use types::{FinalizeOptions, FinalizeRequest, FinalizedEpisode};
