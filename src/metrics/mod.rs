//! Prometheus metrics for the message engine.
//!
//! - Template store metrics (loads by result, cache hits)
//! - Rendering metrics (interpolation gaps, skipped keyboard rows)
//! - Delivery metrics (deliveries by mode and result, latency)
//! - Resilience metrics (retry attempts by operation)

mod helpers;

pub use helpers::{encode_metrics, DeliveryMetrics, RenderMetrics, RetryMetrics, TemplateMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, HistogramVec,
    IntCounter, IntCounterVec,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "smart_messages";

lazy_static! {
    // ============================================================================
    // Template Store Metrics
    // ============================================================================

    /// Backing-source loads by result (ok, not_found, parse_error, source_error)
    pub static ref TEMPLATE_LOADS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_template_loads_total", METRIC_PREFIX),
        "Template documents read from the backing source",
        &["result"]
    ).unwrap();

    /// Requests served from the document cache
    pub static ref TEMPLATE_CACHE_HITS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_template_cache_hits_total", METRIC_PREFIX),
        "Template document requests served from cache"
    ).unwrap();

    // ============================================================================
    // Rendering Metrics
    // ============================================================================

    /// Placeholders left unresolved during interpolation
    pub static ref INTERPOLATION_GAPS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_interpolation_gaps_total", METRIC_PREFIX),
        "Placeholders missing from the render context"
    ).unwrap();

    /// Generator rows dropped because their context list was absent or empty
    pub static ref KEYBOARD_ROWS_SKIPPED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_keyboard_rows_skipped_total", METRIC_PREFIX),
        "Generated keyboard rows skipped for lack of data"
    ).unwrap();

    // ============================================================================
    // Delivery Metrics
    // ============================================================================

    /// Deliveries by mode (text, photo, document) and result (ok, error)
    pub static ref DELIVERIES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_deliveries_total", METRIC_PREFIX),
        "Messages handed to the transport",
        &["mode", "result"]
    ).unwrap();

    /// Transport call latency in seconds, by mode
    pub static ref DELIVERY_LATENCY_SECONDS: HistogramVec = register_histogram_vec!(
        format!("{}_delivery_latency_seconds", METRIC_PREFIX),
        "Transport call latency",
        &["mode"],
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    ).unwrap();

    // ============================================================================
    // Resilience Metrics
    // ============================================================================

    /// Retries scheduled after a transient failure, by operation label
    pub static ref RETRY_ATTEMPTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_retry_attempts_total", METRIC_PREFIX),
        "Retries scheduled after transient failures",
        &["operation"]
    ).unwrap();

    /// Operations that failed for good, by operation label and error code
    pub static ref OPERATION_FAILURES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_operation_failures_total", METRIC_PREFIX),
        "Operations that ended in a surfaced error",
        &["operation", "code"]
    ).unwrap();
}
