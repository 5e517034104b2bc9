//! Episode acquisition.
//!
//! The [`AcquisitionStage`] pulls filtered episodes, runs an [`Acquirer`] for
//! each of them under the download budget and hands the downloaded streams
//! to finalization over a bounded channel.

mod error;
mod stage;
mod subtitles;
mod traits;
mod types;
mod ytdlp;

pub use error::AcquireError;
pub use stage::AcquisitionStage;
pub use subtitles::HttpSubtitleFetcher;
pub use traits::Acquirer;
pub use types::{AcquiredFile, AcquiredMedia, AcquisitionRequest};
pub use ytdlp::YtDlpAcquirer;
