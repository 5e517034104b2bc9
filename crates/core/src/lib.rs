pub mod acquire;
pub mod auth;
pub mod config;
pub mod discovery;
pub mod episode;
pub mod finalize;
pub mod metrics;
pub mod pipeline;
pub mod pool;
pub mod progress;
pub mod provider;
pub mod range;
pub mod scanner;
pub mod testing;

pub use acquire::{AcquireError, AcquiredMedia, Acquirer, AcquisitionStage, YtDlpAcquirer};
pub use auth::{resolve_auth, AuthError, Credential, LoginCredentials, ResolvedAuth, TokenCache};
pub use config::{
    load_config, load_config_from_env, load_config_from_str, validate_config, Config, ConfigError,
    DownloadParameters, SanitizedConfig,
};
pub use discovery::{Discovery, DiscoveryError, EpisodeStream, YtDlpDiscovery};
pub use episode::{EpisodeDescriptor, EpisodeId, SequenceNumber};
pub use finalize::{FfmpegFinalizer, FinalizationStage, FinalizeError, Finalizer};
pub use pipeline::{
    EpisodeStatus, PipelineError, PipelineOrchestrator, PipelineResult, PipelineState, RunReport,
};
pub use pool::{BoundedTaskPool, PoolStatus};
pub use progress::{progress_channel, ProgressEvent, ProgressKind, ProgressSink};
pub use provider::{Provider, ProviderError};
pub use range::{RangeBound, RangeError, RangeFilter};
