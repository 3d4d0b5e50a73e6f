//! Metrics recording interface (always compiled).
//!
//! Components take an `Arc<dyn MetricsRecorder>`; without the `metrics`
//! feature [`default_recorder`] hands out [`NoopMetrics`].

use std::sync::Arc;

/// Ingestion outcome labels
pub mod outcome {
    pub const ACCEPTED: &str = "accepted";
    pub const DUPLICATE: &str = "duplicate";
    /// 400 / 403 / 404 类拒绝
    pub const REJECTED: &str = "rejected";
    /// 存储或票据不可用、超时
    pub const FAILED: &str = "failed";
}

/// Trait for recording application metrics.
///
/// All methods are no-op by default. Implementations must be thread-safe.
#[allow(unused_variables)]
pub trait MetricsRecorder: Send + Sync {
    // ===== Ingestion =====

    /// One tracked view, labelled with an [`outcome`] constant
    fn inc_view(&self, outcome: &str) {}

    fn inc_search(&self, outcome: &str) {}

    /// Event stored but its counter update failed
    fn inc_counter_failure(&self, counter: &str) {}

    // ===== Aggregation =====

    fn inc_aggregation_run(&self, status: &str) {}

    fn inc_retention_failure(&self) {}

    // ===== HTTP =====

    fn observe_http_request(&self, method: &str, route: &str, status: &str, duration_secs: f64) {}
}

/// Noop metrics implementation for tests and builds without `metrics`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsRecorder for NoopMetrics {}

impl NoopMetrics {
    pub fn arc() -> Arc<dyn MetricsRecorder> {
        Arc::new(Self)
    }
}

/// Prometheus-backed recorder when the `metrics` feature is on, noop otherwise
pub fn default_recorder() -> Arc<dyn MetricsRecorder> {
    #[cfg(feature = "metrics")]
    {
        Arc::new(crate::metrics::PrometheusMetrics)
    }
    #[cfg(not(feature = "metrics"))]
    {
        NoopMetrics::arc()
    }
}
