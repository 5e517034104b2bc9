//! Episode discovery.
//!
//! Turns a series URL into a stream of [`EpisodeDescriptor`]s. The shipped
//! implementation asks yt-dlp for the JSON description of the playlist.
//!
//! [`EpisodeDescriptor`]: crate::episode::EpisodeDescriptor

mod error;
mod traits;
mod ytdlp;

pub use error::DiscoveryError;
pub use traits::{Discovery, EpisodeStream};
pub use ytdlp::{parse_document, YtDlpDiscovery};

pub(crate) use ytdlp::credential_args;
