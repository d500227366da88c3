//! Metrics helper structs for convenient metric recording

use std::time::Duration;

use prometheus::{Encoder, TextEncoder};

use super::{
    DELIVERIES_TOTAL, DELIVERY_LATENCY_SECONDS, INTERPOLATION_GAPS_TOTAL,
    KEYBOARD_ROWS_SKIPPED_TOTAL, OPERATION_FAILURES_TOTAL, RETRY_ATTEMPTS_TOTAL,
    TEMPLATE_CACHE_HITS_TOTAL, TEMPLATE_LOADS_TOTAL,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording template store metrics
pub struct TemplateMetrics;

impl TemplateMetrics {
    /// Record a read from the backing source
    pub fn record_load(result: &str) {
        TEMPLATE_LOADS_TOTAL.with_label_values(&[result]).inc();
    }

    /// Record a request served from cache
    pub fn record_cache_hit() {
        TEMPLATE_CACHE_HITS_TOTAL.inc();
    }
}

/// Helper struct for recording rendering metrics
pub struct RenderMetrics;

impl RenderMetrics {
    pub fn record_gaps(count: u64) {
        INTERPOLATION_GAPS_TOTAL.inc_by(count);
    }

    pub fn record_row_skipped() {
        KEYBOARD_ROWS_SKIPPED_TOTAL.inc();
    }
}

/// Helper struct for recording delivery metrics
pub struct DeliveryMetrics;

impl DeliveryMetrics {
    /// Record a successful transport call
    pub fn record_delivered(mode: &str, latency: Duration) {
        DELIVERIES_TOTAL.with_label_values(&[mode, "ok"]).inc();
        DELIVERY_LATENCY_SECONDS
            .with_label_values(&[mode])
            .observe(latency.as_secs_f64());
    }

    /// Record a failed transport call
    pub fn record_failed(mode: &str, latency: Duration) {
        DELIVERIES_TOTAL.with_label_values(&[mode, "error"]).inc();
        DELIVERY_LATENCY_SECONDS
            .with_label_values(&[mode])
            .observe(latency.as_secs_f64());
    }
}

/// Helper struct for recording resilience metrics
pub struct RetryMetrics;

impl RetryMetrics {
    pub fn record_retry(operation: &str) {
        RETRY_ATTEMPTS_TOTAL.with_label_values(&[operation]).inc();
    }

    pub fn record_failure(operation: &str, code: &str) {
        OPERATION_FAILURES_TOTAL
            .with_label_values(&[operation, code])
            .inc();
    }
}
