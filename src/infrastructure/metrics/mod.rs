//! Prometheus metrics for the messaging service.
//!
//! - Dispatch metrics (sends by provider and outcome, gateway latency)
//! - Webhook metrics (callbacks received, status updates recorded)
//! - Store metrics (repository errors)

mod helpers;

pub use helpers::{encode_metrics, DispatchMetrics, StoreMetrics, WebhookMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, HistogramVec, IntCounterVec,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "messenger";

lazy_static! {
    // ============================================================================
    // Dispatch Metrics
    // ============================================================================

    /// Messages handed to a provider, by provider and outcome
    pub static ref DISPATCH_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_dispatch_total", METRIC_PREFIX),
        "Total messages dispatched to providers",
        &["provider", "outcome"]
    ).unwrap();

    /// Dispatches rejected before reaching a provider
    pub static ref DISPATCH_REJECTED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_dispatch_rejected_total", METRIC_PREFIX),
        "Total dispatch requests rejected before sending",
        &["reason"]
    ).unwrap();

    /// Time spent waiting on the provider gateway
    pub static ref PROVIDER_LATENCY: HistogramVec = register_histogram_vec!(
        format!("{}_provider_latency_seconds", METRIC_PREFIX),
        "Provider send latency in seconds",
        &["provider"],
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    ).unwrap();

    // ============================================================================
    // Webhook Metrics
    // ============================================================================

    /// Status callbacks received, by provider
    pub static ref WEBHOOK_RECEIVED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_webhook_received_total", METRIC_PREFIX),
        "Total provider status callbacks received",
        &["provider"]
    ).unwrap();

    /// Status records written from callbacks, by status
    pub static ref WEBHOOK_STATUS_RECORDED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_webhook_status_recorded_total", METRIC_PREFIX),
        "Total delivery status records written from callbacks",
        &["status"]
    ).unwrap();

    /// Callback events that could not be applied
    pub static ref WEBHOOK_SKIPPED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_webhook_skipped_total", METRIC_PREFIX),
        "Total callback events skipped",
        &["provider", "reason"]
    ).unwrap();

    // ============================================================================
    // Store Metrics
    // ============================================================================

    /// Repository errors by entity kind
    pub static ref STORE_ERRORS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_store_errors_total", METRIC_PREFIX),
        "Total repository errors",
        &["entity"]
    ).unwrap();
}
