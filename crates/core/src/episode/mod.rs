//! Episode data model.
//!
//! An [`EpisodeDescriptor`] is produced by a discovery collaborator and read,
//! never mutated, by the pipeline. Identity is the `(season, sequence)` pair
//! captured by [`EpisodeId`].

mod naming;
mod types;

pub use naming::{render_mask, sanitize_file_name, DEFAULT_FILE_MASK};
pub use types::{EpisodeDescriptor, EpisodeId, EpisodeInput, InputKind, SequenceNumber};
