//! Metrics helper structs for convenient metric recording

use std::time::Duration;

use prometheus::{Encoder, TextEncoder};

use super::{
    DISPATCH_REJECTED_TOTAL, DISPATCH_TOTAL, PROVIDER_LATENCY, STORE_ERRORS_TOTAL,
    WEBHOOK_RECEIVED_TOTAL, WEBHOOK_SKIPPED_TOTAL, WEBHOOK_STATUS_RECORDED_TOTAL,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording dispatch metrics
pub struct DispatchMetrics;

impl DispatchMetrics {
    /// Record a message accepted by the provider
    pub fn record_sent(provider: &str) {
        DISPATCH_TOTAL.with_label_values(&[provider, "sent"]).inc();
    }

    /// Record a message the provider refused or never received
    pub fn record_failed(provider: &str) {
        DISPATCH_TOTAL.with_label_values(&[provider, "failed"]).inc();
    }

    /// Record a request rejected before any provider call
    pub fn record_rejected(reason: &str) {
        DISPATCH_REJECTED_TOTAL.with_label_values(&[reason]).inc();
    }

    pub fn observe_latency(provider: &str, elapsed: Duration) {
        PROVIDER_LATENCY
            .with_label_values(&[provider])
            .observe(elapsed.as_secs_f64());
    }
}

/// Helper struct for recording webhook metrics
pub struct WebhookMetrics;

impl WebhookMetrics {
    pub fn record_received(provider: &str) {
        WEBHOOK_RECEIVED_TOTAL.with_label_values(&[provider]).inc();
    }

    /// Record a status row written from a callback
    pub fn record_status(status: &str) {
        WEBHOOK_STATUS_RECORDED_TOTAL
            .with_label_values(&[status])
            .inc();
    }

    pub fn record_skipped(provider: &str, reason: &str) {
        WEBHOOK_SKIPPED_TOTAL
            .with_label_values(&[provider, reason])
            .inc();
    }
}

/// Helper struct for recording store metrics
pub struct StoreMetrics;

impl StoreMetrics {
    pub fn record_error(entity: &str) {
        STORE_ERRORS_TOTAL.with_label_values(&[entity]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_includes_recorded_metrics() {
        DispatchMetrics::record_sent("ntfy");
        WebhookMetrics::record_received("sendgrid");

        let text = encode_metrics().unwrap();
        assert!(text.contains("messenger_dispatch_total"));
        assert!(text.contains("messenger_webhook_received_total"));
    }
}
