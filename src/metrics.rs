//! Prometheus metrics for the feature store and the ranking engine
//!
//! Features:
//! - Store operation counters (by element type and outcome)
//! - Optimistic concurrency conflicts
//! - Validation rejections per strategy
//! - Compiled ranker cache hits/misses and compile latency

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use tracing::{error, info};

lazy_static::lazy_static! {
    /// Global metrics registry
    pub static ref METRICS_REGISTRY: Registry = Registry::new();

    pub static ref STORE_OPERATIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("ltrstore_operations_total", "Total feature store operations"),
        &["operation", "type", "status"]
    ).unwrap();

    pub static ref VERSION_CONFLICTS: IntCounterVec = IntCounterVec::new(
        Opts::new("ltrstore_version_conflicts_total", "Writes rejected by the version check"),
        &["type"]
    ).unwrap();

    pub static ref VALIDATION_REJECTIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("ltrstore_validation_rejections_total", "Writes rejected by validation"),
        &["strategy"]
    ).unwrap();

    pub static ref RANKER_CACHE_HITS: IntCounter = IntCounter::new(
        "ltrstore_ranker_cache_hits_total",
        "Compiled ranker cache hits"
    ).unwrap();

    pub static ref RANKER_CACHE_MISSES: IntCounter = IntCounter::new(
        "ltrstore_ranker_cache_misses_total",
        "Compiled ranker cache misses"
    ).unwrap();

    pub static ref RANKER_COMPILE_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "ltrstore_ranker_compile_duration_seconds",
            "Ranker compilation duration in seconds"
        ).buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        &["ranker_type"]
    ).unwrap();
}

/// Initialize metrics registry
///
/// Safe to call more than once; already registered collectors are skipped.
pub fn init_metrics() {
    info!("Initializing Prometheus metrics");

    METRICS_REGISTRY.register(Box::new(STORE_OPERATIONS.clone())).ok();
    METRICS_REGISTRY.register(Box::new(VERSION_CONFLICTS.clone())).ok();
    METRICS_REGISTRY.register(Box::new(VALIDATION_REJECTIONS.clone())).ok();
    METRICS_REGISTRY.register(Box::new(RANKER_CACHE_HITS.clone())).ok();
    METRICS_REGISTRY.register(Box::new(RANKER_CACHE_MISSES.clone())).ok();
    METRICS_REGISTRY.register(Box::new(RANKER_COMPILE_DURATION.clone())).ok();
}

/// Record a store operation
pub fn record_store_operation(operation: &str, element_type: &str, success: bool) {
    let status = if success { "success" } else { "error" };
    STORE_OPERATIONS
        .with_label_values(&[operation, element_type, status])
        .inc();
}

pub fn record_version_conflict(element_type: &str) {
    VERSION_CONFLICTS.with_label_values(&[element_type]).inc();
}

pub fn record_validation_rejection(strategy: &str) {
    VALIDATION_REJECTIONS.with_label_values(&[strategy]).inc();
}

pub fn record_cache_lookup(hit: bool) {
    if hit {
        RANKER_CACHE_HITS.inc();
    } else {
        RANKER_CACHE_MISSES.inc();
    }
}

pub fn observe_compile(ranker_type: &str, seconds: f64) {
    RANKER_COMPILE_DURATION
        .with_label_values(&[ranker_type])
        .observe(seconds);
}

/// Export all metrics in Prometheus text format
pub fn export_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|_| String::from("# Error converting metrics\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_metrics_twice() {
        init_metrics();
        init_metrics();
    }

    #[test]
    fn test_record_and_export() {
        init_metrics();
        record_store_operation("create", "feature", true);
        record_version_conflict("model");
        record_cache_lookup(true);

        let output = export_metrics();
        assert!(output.contains("ltrstore_operations_total"));
        assert!(output.contains("ltrstore_version_conflicts_total"));
    }

    #[test]
    fn test_cache_counters() {
        let hits = RANKER_CACHE_HITS.get();
        let misses = RANKER_CACHE_MISSES.get();
        record_cache_lookup(true);
        record_cache_lookup(false);
        assert!(RANKER_CACHE_HITS.get() > hits);
        assert!(RANKER_CACHE_MISSES.get() > misses);
    }
}
