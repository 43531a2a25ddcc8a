//! Prometheus metrics for the session orchestrator.
//!
//! This module provides metrics for:
//! - Partial dispatch (throughput, latency, concurrency)
//! - Finalize (attempts, outcomes, forced runs)
//! - Session lifecycle

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Partial Dispatch Metrics
// =============================================================================

/// Partial batches handed to the processor.
pub static PARTIALS_DISPATCHED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "cadence_partials_dispatched_total",
        "Total partial batches dispatched",
    )
    .unwrap()
});

/// Partial batches finished by result.
pub static PARTIALS_COMPLETED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "cadence_partials_completed_total",
            "Total partial batches finished",
        ),
        &["result"], // "success", "failure"
    )
    .unwrap()
});

/// Partial processing duration in seconds.
pub static PARTIAL_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "cadence_partial_duration_seconds",
            "Duration of partial batch processing",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]),
        &["result"],
    )
    .unwrap()
});

/// Partial batches currently being processed.
pub static PARTIALS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "cadence_partials_in_flight",
        "Partial batches currently in flight",
    )
    .unwrap()
});

/// Completions discarded because their session generation was retired.
pub static STALE_COMPLETIONS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "cadence_stale_completions_total",
        "Total completions discarded for a retired session generation",
    )
    .unwrap()
});

// =============================================================================
// Finalize Metrics
// =============================================================================

/// Terminal handler attempts by result.
pub static FINALIZE_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "cadence_finalize_attempts_total",
            "Total terminal handler attempts",
        ),
        &["result"], // "success", "failure"
    )
    .unwrap()
});

/// Finalize requests resolved by outcome.
pub static FINALIZE_OUTCOMES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "cadence_finalize_outcomes_total",
            "Total finalize requests resolved",
        ),
        &["outcome"], // "completed", "provisional", "failed", "aborted"
    )
    .unwrap()
});

/// Time from finalize request to resolution.
pub static FINALIZE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "cadence_finalize_duration_seconds",
            "Duration from finalize request to resolution",
        )
        .buckets(vec![0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 180.0, 300.0]),
        &["outcome"],
    )
    .unwrap()
});

/// Finalize runs forced by the readiness timeout.
pub static FINALIZE_FORCED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "cadence_finalize_forced_total",
        "Total finalize runs forced before all batches finished",
    )
    .unwrap()
});

// =============================================================================
// Session Metrics
// =============================================================================

/// Sessions started total.
pub static SESSIONS_STARTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("cadence_sessions_started_total", "Total sessions started").unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Partials
        Box::new(PARTIALS_DISPATCHED.clone()),
        Box::new(PARTIALS_COMPLETED.clone()),
        Box::new(PARTIAL_DURATION.clone()),
        Box::new(PARTIALS_IN_FLIGHT.clone()),
        Box::new(STALE_COMPLETIONS.clone()),
        // Finalize
        Box::new(FINALIZE_ATTEMPTS.clone()),
        Box::new(FINALIZE_OUTCOMES.clone()),
        Box::new(FINALIZE_DURATION.clone()),
        Box::new(FINALIZE_FORCED.clone()),
        // Sessions
        Box::new(SESSIONS_STARTED.clone()),
    ]
}

/// Label for a success/failure result.
pub(crate) fn result_label(ok: bool) -> &'static str {
    if ok {
        "success"
    } else {
        "failure"
    }
}
