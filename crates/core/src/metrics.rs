//! Prometheus metrics for catalog synchronization.
//!
//! This module provides metrics for:
//! - Remote catalog queries (by operation and outcome)
//! - Backfill sub-requests
//! - Refresh cycles
//! - Cache size

use once_cell::sync::Lazy;
use prometheus::{IntCounterVec, IntGauge, Opts};

use crate::query::QueryError;

/// Remote catalog queries by operation and outcome.
pub static CATALOG_QUERIES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("marquee_catalog_queries_total", "Total remote catalog queries"),
        &["operation", "outcome"], // outcome: "ok", "transport", "protocol", "remote"
    )
    .unwrap()
});

/// Backfill sub-requests by outcome.
pub static BACKFILL_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "marquee_backfill_requests_total",
            "Backfill sub-requests issued during refresh",
        ),
        &["outcome"], // "ok", "failed"
    )
    .unwrap()
});

/// Refresh cycles by outcome.
pub static REFRESH_CYCLES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("marquee_refresh_cycles_total", "Refresh cycles"),
        &["outcome"], // "completed", "failed", "rejected"
    )
    .unwrap()
});

/// Records currently held by the catalog cache.
pub static CACHE_SIZE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("marquee_cache_records", "Records in the catalog cache").unwrap()
});

/// Get all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(CATALOG_QUERIES.clone()),
        Box::new(BACKFILL_REQUESTS.clone()),
        Box::new(REFRESH_CYCLES.clone()),
        Box::new(CACHE_SIZE.clone()),
    ]
}

/// Count one remote query.
pub fn record_query<T>(operation: &str, outcome: &Result<T, QueryError>) {
    let outcome = match outcome {
        Ok(_) => "ok",
        Err(QueryError::Transport(_)) => "transport",
        Err(QueryError::Protocol(_)) => "protocol",
        Err(QueryError::Remote(_)) => "remote",
    };
    CATALOG_QUERIES
        .with_label_values(&[operation, outcome])
        .inc();
}
