//! Pipeline orchestration.
//!
//! A run filters the discovered episodes (season range, episode range, dub
//! variants, files already on disk), then streams the rest through two
//! bounded stages connected by a bounded channel:
//!
//! ```text
//! episodes ──► AcquisitionStage (D) ──► handoff (capacity) ──► FinalizationStage (E)
//! ```
//!
//! Per-episode failures never stop siblings. The first failure is reported
//! once both stages drained.

mod error;
mod filter;
mod orchestrator;
mod types;

pub use error::PipelineError;
pub use filter::{apply_ranges, select_variants};
pub use orchestrator::PipelineOrchestrator;
pub use types::{EpisodeStatus, PipelineResult, PipelineState, RunReport, StageReport};
