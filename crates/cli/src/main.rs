mod args;
mod progress;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use prometheus::{Encoder, Registry, TextEncoder};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use serialdl_core::{
    acquire::HttpSubtitleFetcher, load_config, load_config_from_env, metrics, progress_channel,
    resolve_auth, validate_config, EpisodeStatus, FfmpegFinalizer, PipelineError,
    PipelineOrchestrator, Provider, SanitizedConfig, YtDlpAcquirer, YtDlpDiscovery,
};

use args::Cli;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Buffer size for the progress event channel
const PROGRESS_BUFFER_SIZE: usize = 256;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run(cli).await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    info!("serialdl {}", VERSION);

    // Load configuration
    let mut config = match &cli.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            load_config(path).with_context(|| format!("Failed to load config from {:?}", path))?
        }
        None => load_config_from_env().context("Failed to load configuration")?,
    };
    cli.apply(&mut config);

    let provider = Provider::from_url(&cli.url).context("Unsupported series URL")?;
    if config.auth.username.is_some() && config.auth.token_endpoint.is_none() {
        config.auth.token_endpoint = provider.default_token_endpoint().map(str::to_string);
    }

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;
    info!("Provider: {}", provider.name());
    info!(
        "Configuration: {}",
        serde_json::to_string(&SanitizedConfig::from(&config)).unwrap_or_default()
    );

    let client = reqwest::Client::builder()
        .user_agent(format!("serialdl/{}", VERSION))
        .build()
        .context("Failed to build HTTP client")?;

    let auth = resolve_auth(&config.auth, &client)
        .await
        .map_err(PipelineError::from)
        .context("Failed to resolve credentials")?;

    // Collaborators
    let discovery = YtDlpDiscovery::new(&config.tools)
        .with_format(config.download.format.clone())
        .with_credential(auth.credential.clone());
    let acquirer = YtDlpAcquirer::new(&config.tools)
        .with_subtitle_fetcher(HttpSubtitleFetcher::new(client.clone(), auth.tokens.clone()));
    let finalizer = FfmpegFinalizer::new(&config.tools);

    let (sink, rx) = progress_channel(PROGRESS_BUFFER_SIZE);
    let progress_task = tokio::spawn(progress::log_progress(rx));

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_interrupt(cancel.clone()));

    let orchestrator = PipelineOrchestrator::new(
        Arc::new(acquirer),
        Arc::new(finalizer),
        config.download.clone(),
    )
    .with_credential(auth.credential)
    .with_progress(sink)
    .with_cancellation(cancel);

    let report = orchestrator.run_url(&discovery, &cli.url).await;

    // Dropping the last sink closes the channel and ends the consumer.
    drop(orchestrator);
    if let Err(e) = progress_task.await {
        warn!("Progress logger stopped: {}", e);
    }

    for result in &report.results {
        match result.status {
            EpisodeStatus::Completed | EpisodeStatus::Skipped => info!(
                "{} {:?}: {}",
                result.episode_id,
                result.status,
                result
                    .path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default()
            ),
            EpisodeStatus::Failed => error!(
                "{} failed: {}",
                result.episode_id,
                result.error.as_deref().unwrap_or("unknown error")
            ),
        }
    }
    info!(
        "Run {} finished: {} completed, {} skipped, {} failed",
        report.run_id,
        report.count(EpisodeStatus::Completed),
        report.count(EpisodeStatus::Skipped),
        report.count(EpisodeStatus::Failed)
    );

    if cli.print_metrics {
        println!("{}", render_metrics()?);
    }

    report.into_result().context("Download run failed")?;
    Ok(())
}

/// Cancels the run on Ctrl+C; in-flight episodes still finish.
async fn cancel_on_interrupt(cancel: CancellationToken) {
    if signal::ctrl_c().await.is_ok() {
        warn!("Interrupted, finishing episodes already in progress");
        cancel.cancel();
    }
}

/// Text exposition of the core metrics.
fn render_metrics() -> Result<String> {
    let registry = Registry::new();
    metrics::register_all(&registry).context("Failed to register metrics")?;

    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&registry.gather(), &mut buffer)
        .context("Failed to encode metrics")?;
    String::from_utf8(buffer).context("Metrics are not valid UTF-8")
}
