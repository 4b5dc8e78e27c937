//! Metrics collection for observability

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec_with_registry, register_counter_with_registry,
    register_histogram_vec_with_registry, register_histogram_with_registry, Counter, CounterVec,
    Histogram, HistogramVec, Opts, Registry,
};
use std::sync::Arc;

/// Global metrics registry
pub static METRICS: Lazy<Arc<Metrics>> =
    Lazy::new(|| Arc::new(Metrics::new().expect("Failed to initialize metrics")));

/// Metrics collector
pub struct Metrics {
    registry: Registry,

    // Session metrics
    pub chat_sessions: CounterVec,
    pub session_duration: Histogram,
    pub events_emitted: CounterVec,

    // LLM metrics
    pub llm_requests: CounterVec,
    pub llm_request_duration: HistogramVec,

    // Artifact store metrics
    pub artifact_cache_hits: Counter,
    pub artifact_cache_misses: Counter,
    pub artifact_loads: CounterVec,

    // Cluster prediction metrics
    pub cluster_predictions: CounterVec,

    // Voice metrics
    pub voice_requests: CounterVec,
    pub voice_request_duration: HistogramVec,

    // Report metrics
    pub reports_generated: CounterVec,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let registry = Registry::new();

        let chat_sessions = register_counter_vec_with_registry!(
            Opts::new("chat_sessions_total", "Chat sessions by mode and outcome"),
            &["mode", "status"],
            registry
        )?;

        let session_duration = register_histogram_with_registry!(
            "session_duration_seconds",
            "End-to-end session duration in seconds",
            registry
        )?;

        let events_emitted = register_counter_vec_with_registry!(
            Opts::new("stream_events_total", "Stream events emitted by type"),
            &["type"],
            registry
        )?;

        let llm_requests = register_counter_vec_with_registry!(
            Opts::new("llm_requests_total", "LLM vendor requests"),
            &["op", "status"],
            registry
        )?;

        let llm_request_duration = register_histogram_vec_with_registry!(
            "llm_request_duration_seconds",
            "LLM request duration in seconds",
            &["op"],
            registry
        )?;

        let artifact_cache_hits = register_counter_with_registry!(
            Opts::new("artifact_cache_hits_total", "Artifact cache hits"),
            registry
        )?;

        let artifact_cache_misses = register_counter_with_registry!(
            Opts::new("artifact_cache_misses_total", "Artifact cache misses"),
            registry
        )?;

        let artifact_loads = register_counter_vec_with_registry!(
            Opts::new("artifact_loads_total", "Artifact file loads"),
            &["status"],
            registry
        )?;

        let cluster_predictions = register_counter_vec_with_registry!(
            Opts::new("cluster_predictions_total", "Cluster predictions"),
            &["status"],
            registry
        )?;

        let voice_requests = register_counter_vec_with_registry!(
            Opts::new("voice_requests_total", "Voice vendor requests"),
            &["op", "status"],
            registry
        )?;

        let voice_request_duration = register_histogram_vec_with_registry!(
            "voice_request_duration_seconds",
            "Voice request duration in seconds",
            &["op"],
            registry
        )?;

        let reports_generated = register_counter_vec_with_registry!(
            Opts::new("reports_generated_total", "PDF reports generated"),
            &["status"],
            registry
        )?;

        Ok(Self {
            registry,
            chat_sessions,
            session_duration,
            events_emitted,
            llm_requests,
            llm_request_duration,
            artifact_cache_hits,
            artifact_cache_misses,
            artifact_loads,
            cluster_predictions,
            voice_requests,
            voice_request_duration,
            reports_generated,
        })
    }

    /// Get the metrics registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
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
