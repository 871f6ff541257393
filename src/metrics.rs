//! Prometheus counters for the build pipeline and provider client
//! (SPEC_FULL.md §2's ambient observability: provider calls
//! issued/retried/failed, cache hits/misses, stage duration, and the
//! halted-stage gauge). The teacher's `main.rs` exposes these through a
//! `/metrics` + `/health` axum server spawned as a background task; we
//! keep that shape in `bin/meetpoint_build.rs`.
//!
//! Metrics are registered once into the global `prometheus::Registry`
//! behind `std::sync::OnceLock`, the standard-library alternative to
//! `lazy_static` now that `OnceLock` is stable.

use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    HistogramVec, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;

pub fn provider_calls_total() -> &'static IntCounterVec {
    static METRIC: OnceLock<IntCounterVec> = OnceLock::new();
    METRIC.get_or_init(|| {
        register_int_counter_vec!(
            "meetpoint_provider_calls_total",
            "Provider API calls by endpoint and outcome",
            &["endpoint", "outcome"]
        )
        .expect("metric registration")
    })
}

pub fn provider_retries_total() -> &'static IntCounter {
    static METRIC: OnceLock<IntCounter> = OnceLock::new();
    METRIC.get_or_init(|| {
        register_int_counter!(
            "meetpoint_provider_retries_total",
            "Provider API calls retried after a transient failure"
        )
        .expect("metric registration")
    })
}

pub fn cache_hits_total() -> &'static IntCounterVec {
    static METRIC: OnceLock<IntCounterVec> = OnceLock::new();
    METRIC.get_or_init(|| {
        register_int_counter_vec!(
            "meetpoint_cache_hits_total",
            "Provider response cache hits by endpoint",
            &["endpoint"]
        )
        .expect("metric registration")
    })
}

pub fn cache_misses_total() -> &'static IntCounterVec {
    static METRIC: OnceLock<IntCounterVec> = OnceLock::new();
    METRIC.get_or_init(|| {
        register_int_counter_vec!(
            "meetpoint_cache_misses_total",
            "Provider response cache misses by endpoint",
            &["endpoint"]
        )
        .expect("metric registration")
    })
}

pub fn stage_duration_seconds() -> &'static HistogramVec {
    static METRIC: OnceLock<HistogramVec> = OnceLock::new();
    METRIC.get_or_init(|| {
        register_histogram_vec!(
            "meetpoint_stage_duration_seconds",
            "Build pipeline stage wall-clock duration",
            &["stage"]
        )
        .expect("metric registration")
    })
}

/// Index (1-8) of the stage the pipeline last halted on, or 0 while
/// running/after a clean finish.
pub fn halted_stage() -> &'static IntGauge {
    static METRIC: OnceLock<IntGauge> = OnceLock::new();
    METRIC.get_or_init(|| {
        register_int_gauge!(
            "meetpoint_halted_stage",
            "Index of the build stage the pipeline last halted on, 0 if none"
        )
        .expect("metric registration")
    })
}
