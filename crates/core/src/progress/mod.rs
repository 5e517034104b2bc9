//! Per-episode progress events.
//!
//! Stages report through a cloneable [`ProgressSink`]. Events travel over a
//! bounded channel to whoever consumes them (the CLI logs them). The sink
//! drops any event that would move an episode backwards, so consumers see
//! `Started → Progress* → Completed | Failed` for every episode.

mod sink;
mod types;

pub use sink::{progress_channel, ProgressReporter, ProgressSink};
pub use types::{ProgressEvent, ProgressKind};
