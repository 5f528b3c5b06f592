#![allow(clippy::expect_used)]

use lazy_static::lazy_static;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ==== Queue Metrics ====
    pub static ref QUEUE_ITEMS: IntGauge = {
        let metric = IntGauge::new("forensics_queue_items", "Number of items in the analysis queue")
            .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    // ==== Session Metrics ====
    pub static ref ACTIVE_SESSIONS: IntGauge = {
        let metric = IntGauge::new("forensics_active_sessions", "Number of running analysis sessions")
            .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref SESSIONS_COMPLETED: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new(
                "forensics_sessions_completed_total",
                "Total number of analysis sessions by outcome",
            ),
            &["media_kind", "outcome"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref SEGMENTS_PROCESSED: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new(
                "forensics_segments_total",
                "Total number of video segments by outcome",
            ),
            &["outcome"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    // ==== Classifier Metrics ====
    pub static ref CLASSIFICATION_LATENCY: HistogramVec = {
        let metric = HistogramVec::new(
            HistogramOpts::new(
                "forensics_classification_latency_seconds",
                "Latency of classifier calls",
            )
            .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
            &["classifier", "status"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    // ==== History Metrics ====
    pub static ref HISTORY_WRITE_FAILURES: IntCounter = {
        let metric = IntCounter::new(
            "forensics_history_write_failures_total",
            "Total number of history writes that failed",
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };
}

/// Helper function to encode metrics for Prometheus scraping
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| {
        prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e))
    })
}
