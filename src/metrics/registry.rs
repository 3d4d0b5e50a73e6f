//! Global metrics registry
//!
//! Defines every Prometheus metric the service exports.

use once_cell::sync::Lazy;
use prometheus::{
    CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, IntCounter, Opts, Registry,
    TextEncoder,
};
use tracing::error;

use crate::errors::{Result, ViewPulseError};
use crate::metrics_core::MetricsRecorder;

static METRICS: Lazy<Option<Metrics>> = Lazy::new(|| match Metrics::new() {
    Ok(metrics) => Some(metrics),
    Err(e) => {
        error!("Failed to build metrics registry: {}", e);
        None
    }
});

/// Global metrics instance, `None` if registration failed
pub fn metrics() -> Option<&'static Metrics> {
    METRICS.as_ref()
}

/// Application metrics container
pub struct Metrics {
    registry: Registry,

    /// Tracked views by outcome
    pub views_total: CounterVec,
    /// Search events by outcome
    pub searches_total: CounterVec,
    /// Counter updates that failed after the event was stored
    pub counter_failures_total: CounterVec,

    /// Daily aggregation runs by status
    pub aggregation_runs_total: CounterVec,
    /// Retention sweeps with at least one failed table
    pub retention_failures_total: IntCounter,

    pub http_requests_total: CounterVec,
    pub http_request_duration_seconds: HistogramVec,

    /// Server uptime in seconds
    pub uptime_seconds: Gauge,
}

impl Metrics {
    fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let views_total = CounterVec::new(
            Opts::new("viewpulse_views_total", "Tracked views by outcome"),
            &["outcome"],
        )?;
        let searches_total = CounterVec::new(
            Opts::new("viewpulse_searches_total", "Search events by outcome"),
            &["outcome"],
        )?;
        let counter_failures_total = CounterVec::new(
            Opts::new(
                "viewpulse_counter_failures_total",
                "Counter updates that failed after the event was stored",
            ),
            &["counter"],
        )?;
        let aggregation_runs_total = CounterVec::new(
            Opts::new(
                "viewpulse_aggregation_runs_total",
                "Daily aggregation runs by status",
            ),
            &["status"],
        )?;
        let retention_failures_total = IntCounter::new(
            "viewpulse_retention_failures_total",
            "Retention sweeps where pruning a table failed",
        )?;
        let http_requests_total = CounterVec::new(
            Opts::new("viewpulse_http_requests_total", "HTTP requests"),
            &["method", "route", "status"],
        )?;
        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "viewpulse_http_request_duration_seconds",
                "HTTP request latency",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 3.0]),
            &["method", "route", "status"],
        )?;
        let uptime_seconds = Gauge::new("viewpulse_uptime_seconds", "Server uptime in seconds")?;

        registry.register(Box::new(views_total.clone()))?;
        registry.register(Box::new(searches_total.clone()))?;
        registry.register(Box::new(counter_failures_total.clone()))?;
        registry.register(Box::new(aggregation_runs_total.clone()))?;
        registry.register(Box::new(retention_failures_total.clone()))?;
        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        Ok(Self {
            registry,
            views_total,
            searches_total,
            counter_failures_total,
            aggregation_runs_total,
            retention_failures_total,
            http_requests_total,
            http_request_duration_seconds,
            uptime_seconds,
        })
    }

    /// Export metrics in Prometheus text format
    pub fn export(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| ViewPulseError::serialization(format!("metrics encoding: {}", e)))?;
        String::from_utf8(buffer)
            .map_err(|e| ViewPulseError::serialization(format!("metrics encoding: {}", e)))
    }
}

/// Export the global registry
pub fn export() -> Result<String> {
    metrics()
        .ok_or_else(|| ViewPulseError::serialization("metrics registry unavailable"))?
        .export()
}

/// Recorder that writes into the global registry
#[derive(Debug, Default, Clone, Copy)]
pub struct PrometheusMetrics;

impl MetricsRecorder for PrometheusMetrics {
    fn inc_view(&self, outcome: &str) {
        if let Some(m) = metrics() {
            m.views_total.with_label_values(&[outcome]).inc();
        }
    }

    fn inc_search(&self, outcome: &str) {
        if let Some(m) = metrics() {
            m.searches_total.with_label_values(&[outcome]).inc();
        }
    }

    fn inc_counter_failure(&self, counter: &str) {
        if let Some(m) = metrics() {
            m.counter_failures_total.with_label_values(&[counter]).inc();
        }
    }

    fn inc_aggregation_run(&self, status: &str) {
        if let Some(m) = metrics() {
            m.aggregation_runs_total.with_label_values(&[status]).inc();
        }
    }

    fn inc_retention_failure(&self) {
        if let Some(m) = metrics() {
            m.retention_failures_total.inc();
        }
    }

    fn observe_http_request(&self, method: &str, route: &str, status: &str, duration_secs: f64) {
        if let Some(m) = metrics() {
            let labels = [method, route, status];
            m.http_requests_total.with_label_values(&labels).inc();
            m.http_request_duration_seconds
                .with_label_values(&labels)
                .observe(duration_secs);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorded_values_show_up_in_export() {
        let recorder = PrometheusMetrics;
        recorder.inc_view("duplicate");
        recorder.inc_aggregation_run("success");
        recorder.observe_http_request("POST", "/api/v1/track-view", "201", 0.002);

        let text = export().unwrap();
        assert!(text.contains("viewpulse_views_total{outcome=\"duplicate\"}"));
        assert!(text.contains("viewpulse_aggregation_runs_total{status=\"success\"}"));
        assert!(text.contains("viewpulse_http_request_duration_seconds_bucket"));
        assert!(text.contains("route=\"/api/v1/track-view\""));
    }
}
