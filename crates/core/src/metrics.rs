//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Filtering (episodes filtered out, skipped as existing)
//! - Acquisition (downloads by result, durations)
//! - Finalization (encodes and direct moves by result, durations)
//! - Runs (by terminal state)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};

// =============================================================================
// Filtering Metrics
// =============================================================================

/// Episodes removed by range or dub filtering.
pub static EPISODES_FILTERED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "serialdl_episodes_filtered_total",
        "Episodes removed by range or dub filters",
    )
    .expect("metric can be created")
});

/// Episodes skipped because their output already exists.
pub static EPISODES_SKIPPED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "serialdl_episodes_skipped_total",
        "Episodes skipped because their output already exists",
    )
    .expect("metric can be created")
});

// =============================================================================
// Acquisition Metrics
// =============================================================================

/// Acquisitions total by result.
pub static ACQUISITIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("serialdl_acquisitions_total", "Total episode acquisitions"),
        &["result"], // "success", "failed", "entitlement_required"
    )
    .expect("metric can be created")
});

/// Acquisition duration in seconds.
pub static ACQUISITION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "serialdl_acquisition_duration_seconds",
            "Duration of episode downloads",
        )
        .buckets(vec![5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0]),
        &["result"],
    )
    .expect("metric can be created")
});

// =============================================================================
// Finalization Metrics
// =============================================================================

/// Finalizations total by mode and result.
pub static FINALIZATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("serialdl_finalizations_total", "Total episode finalizations"),
        &["mode", "result"], // mode: "encode", "move"
    )
    .expect("metric can be created")
});

/// Finalization duration in seconds.
pub static FINALIZATION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "serialdl_finalization_duration_seconds",
            "Duration of merge, encode and move",
        )
        .buckets(vec![1.0, 10.0, 30.0, 60.0, 300.0, 600.0, 1800.0, 3600.0]),
        &["mode"],
    )
    .expect("metric can be created")
});

// =============================================================================
// Run Metrics
// =============================================================================

/// Runs total by terminal state.
pub static RUNS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("serialdl_runs_total", "Pipeline runs by terminal state"),
        &["state"],
    )
    .expect("metric can be created")
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Filtering
        Box::new(EPISODES_FILTERED.clone()),
        Box::new(EPISODES_SKIPPED.clone()),
        // Acquisition
        Box::new(ACQUISITIONS_TOTAL.clone()),
        Box::new(ACQUISITION_DURATION.clone()),
        // Finalization
        Box::new(FINALIZATIONS_TOTAL.clone()),
        Box::new(FINALIZATION_DURATION.clone()),
        // Runs
        Box::new(RUNS_TOTAL.clone()),
    ]
}

/// Registers every core metric in `registry`.
pub fn register_all(registry: &Registry) -> Result<(), prometheus::Error> {
    for metric in all_metrics() {
        registry.register(metric)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Encoder;

    #[test]
    fn test_register_all_and_encode() {
        let registry = Registry::new();
        register_all(&registry).unwrap();

        ACQUISITIONS_TOTAL.with_label_values(&["success"]).inc();

        let mut buffer = Vec::new();
        prometheus::TextEncoder::new()
            .encode(&registry.gather(), &mut buffer)
            .unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("serialdl_acquisitions_total"));
    }

    #[test]
    fn test_double_registration_fails() {
        let registry = Registry::new();
        register_all(&registry).unwrap();
        assert!(register_all(&registry).is_err());
    }
}
