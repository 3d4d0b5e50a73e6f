//! ViewPulse - view tracking and trending analytics
//!
//! # Architecture
//! - `analytics`: ingestion, deduplication, counters, daily aggregation, retention
//! - `cache`: idempotency ticket stores (moka / redis) and query result caches
//! - `storage`: SeaORM-backed persistence (SQLite / MySQL / PostgreSQL)
//! - `services`: query facade and content directory service
//! - `api`: HTTP handlers and middleware
//! - `interfaces`: CLI commands
//! - `config`: static configuration
//! - `runtime`: application lifecycle and execution modes
//! - `system`: logging and panic handling
//! - `metrics`: Prometheus export (feature `metrics`)

pub mod analytics;
pub mod api;
pub mod cache;
pub mod cli;
pub mod config;
pub mod errors;
pub mod interfaces;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod metrics_core;
pub mod runtime;
pub mod services;
pub mod storage;
pub mod system;
pub mod utils;
