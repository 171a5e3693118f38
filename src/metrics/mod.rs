//! Metrics collection for observability

use prometheus::{
    register_counter_vec_with_registry, register_counter_with_registry,
    register_histogram_vec_with_registry, Counter, CounterVec, HistogramVec, Opts, Registry,
};
use std::sync::Arc;
use once_cell::sync::Lazy;

use crate::conversation::GateDecision;

/// Global metrics registry
pub static METRICS: Lazy<Arc<Metrics>> = Lazy::new(|| {
    Arc::new(Metrics::new().expect("Failed to initialize metrics"))
});

/// Metrics collector
pub struct Metrics {
    registry: Registry,

    // Text pipeline
    pub submissions: CounterVec,
    pub resets: Counter,

    // Image pipeline
    pub image_requests: CounterVec,
    pub background_removals: Counter,
    pub triage_labels: CounterVec,

    pub request_duration: HistogramVec,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let submissions = register_counter_vec_with_registry!(
            Opts::new("symptom_submissions_total", "Symptom messages by gate outcome"),
            &["outcome"],
            registry
        )?;

        let resets = register_counter_with_registry!(
            Opts::new("conversation_resets_total", "Total conversation resets"),
            registry
        )?;

        let image_requests = register_counter_vec_with_registry!(
            Opts::new("image_requests_total", "Image classification requests by status"),
            &["status"],
            registry
        )?;

        let background_removals = register_counter_with_registry!(
            Opts::new(
                "background_removals_total",
                "Images sent through background removal before classification"
            ),
            registry
        )?;

        let triage_labels = register_counter_vec_with_registry!(
            Opts::new("triage_labels_total", "Top triage label per routed image"),
            &["label"],
            registry
        )?;

        let request_duration = register_histogram_vec_with_registry!(
            "request_duration_seconds",
            "Request duration in seconds",
            &["endpoint"],
            registry
        )?;

        Ok(Self {
            registry,
            submissions,
            resets,
            image_requests,
            background_removals,
            triage_labels,
            request_duration,
        })
    }

    /// Record a gated symptom message
    pub fn record_submission(&self, decision: GateDecision) {
        let outcome = match decision {
            GateDecision::Accept => "accept",
            GateDecision::Advisory => "advisory",
            GateDecision::Echo => "echo",
        };
        self.submissions.with_label_values(&[outcome]).inc();
    }

    /// Record an image request outcome
    pub fn record_image_request(&self, status: &str) {
        self.image_requests.with_label_values(&[status]).inc();
    }

    /// Observe how long an endpoint took
    pub fn observe_duration(&self, endpoint: &str, seconds: f64) {
        self.request_duration
            .with_label_values(&[endpoint])
            .observe(seconds);
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        use prometheus::Encoder;

        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).unwrap_or_default();

        String::from_utf8(buffer).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_initialization() {
        let metrics = Metrics::new();
        assert!(metrics.is_ok());
    }

    #[test]
    fn test_record_submission() {
        let metrics = Metrics::new().unwrap();
        metrics.record_submission(GateDecision::Accept);
        metrics.record_submission(GateDecision::Accept);
        metrics.record_submission(GateDecision::Echo);
        assert_eq!(metrics.submissions.with_label_values(&["accept"]).get(), 2.0);
        assert_eq!(metrics.submissions.with_label_values(&["echo"]).get(), 1.0);
    }

    #[test]
    fn test_export_contains_registered_metrics() {
        let metrics = Metrics::new().unwrap();
        metrics.resets.inc();
        metrics.record_image_request("not_ready");
        let text = metrics.export_prometheus();
        assert!(text.contains("conversation_resets_total 1"));
        assert!(text.contains("image_requests_total{status=\"not_ready\"} 1"));
    }
}
