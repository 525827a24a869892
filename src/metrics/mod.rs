//! Metrics collection for observability

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec_with_registry, register_histogram_vec_with_registry,
    register_histogram_with_registry, register_int_gauge_with_registry, CounterVec, Histogram,
    HistogramVec, IntGauge, Opts, Registry,
};
use std::sync::Arc;

/// Global metrics registry
pub static METRICS: Lazy<Arc<Metrics>> = Lazy::new(|| {
    Arc::new(Metrics::new().expect("Failed to initialize metrics"))
});

/// Metrics collector
pub struct Metrics {
    registry: Registry,

    // Endpoint metrics
    pub upload_requests: CounterVec,
    pub query_requests: CounterVec,
    pub extract_requests: CounterVec,
    pub ask_requests: CounterVec,
    pub request_duration: HistogramVec,

    // Upstream model metrics
    pub gemini_requests: CounterVec,

    // Retrieval metrics
    pub indexed_chunks: Histogram,
    pub active_sessions: IntGauge,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let registry = Registry::new();

        let upload_requests = register_counter_vec_with_registry!(
            Opts::new("upload_requests_total", "Total document upload requests"),
            &["kind", "status"],
            registry
        )?;

        let query_requests = register_counter_vec_with_registry!(
            Opts::new("query_requests_total", "Total retrieval query requests"),
            &["status"],
            registry
        )?;

        let extract_requests = register_counter_vec_with_registry!(
            Opts::new("extract_requests_total", "Total field extraction requests"),
            &["status"],
            registry
        )?;

        let ask_requests = register_counter_vec_with_registry!(
            Opts::new("ask_requests_total", "Total streamed answer requests"),
            &["status"],
            registry
        )?;

        let request_duration = register_histogram_vec_with_registry!(
            "request_duration_seconds",
            "Request duration in seconds",
            &["endpoint"],
            registry
        )?;

        let gemini_requests = register_counter_vec_with_registry!(
            Opts::new("gemini_requests_total", "Total Generative Language API calls"),
            &["operation", "status"],
            registry
        )?;

        let indexed_chunks = register_histogram_with_registry!(
            "indexed_chunks",
            "Chunks per built index",
            registry
        )?;

        let active_sessions = register_int_gauge_with_registry!(
            Opts::new("active_sessions", "Number of live retrieval sessions"),
            registry
        )?;

        Ok(Self {
            registry,
            upload_requests,
            query_requests,
            extract_requests,
            ask_requests,
            request_duration,
            gemini_requests,
            indexed_chunks,
            active_sessions,
        })
    }

    /// Get the metrics registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record a document upload (`kind` is "html" or "image")
    pub fn record_upload(&self, kind: &str, success: bool) {
        let status = if success { "success" } else { "error" };
        self.upload_requests.with_label_values(&[kind, status]).inc();
    }

    /// Record a retrieval query request
    pub fn record_query(&self, success: bool) {
        let status = if success { "success" } else { "error" };
        self.query_requests.with_label_values(&[status]).inc();
    }

    /// Record a field extraction request
    pub fn record_extract(&self, success: bool) {
        let status = if success { "success" } else { "error" };
        self.extract_requests.with_label_values(&[status]).inc();
    }

    /// Record a streamed answer request
    pub fn record_ask(&self, success: bool) {
        let status = if success { "success" } else { "error" };
        self.ask_requests.with_label_values(&[status]).inc();
    }

    /// Record an upstream model API call
    pub fn record_gemini(&self, operation: &str, success: bool) {
        let status = if success { "success" } else { "error" };
        self.gemini_requests
            .with_label_values(&[operation, status])
            .inc();
    }

    /// Record a built index's size and bump the session gauge
    pub fn record_index_built(&self, chunks: usize, new_session: bool) {
        self.indexed_chunks.observe(chunks as f64);
        if new_session {
            self.active_sessions.inc();
        }
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
    fn test_record_endpoints() {
        let metrics = Metrics::new().unwrap();
        metrics.record_upload("html", true);
        metrics.record_upload("image", false);
        metrics.record_query(true);
        metrics.record_extract(false);
        metrics.record_ask(true);
        metrics.record_gemini("embed", true);
        // Metrics should be recorded without panicking
    }

    #[test]
    fn test_export_contains_registered_families() {
        let metrics = Metrics::new().unwrap();
        metrics.record_upload("html", true);
        metrics.record_index_built(12, true);
        let text = metrics.export_prometheus();
        assert!(text.contains("upload_requests_total"));
        assert!(text.contains("indexed_chunks"));
        assert!(text.contains("active_sessions"));
    }
}
