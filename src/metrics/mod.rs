//! Prometheus metrics module
//!
//! Requires the `metrics` feature.

mod registry;

pub use registry::{Metrics, PrometheusMetrics, export, metrics};
