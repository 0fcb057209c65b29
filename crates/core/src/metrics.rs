//! Prometheus metrics for core operations.
//!
//! This module provides metrics for:
//! - Search jobs (outcome, status checks spent waiting)
//! - Torrent submissions by source
//! - Retention purges

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Search Metrics
// =============================================================================

/// Search jobs total by result.
pub static SEARCHES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("grabbit_searches_total", "Total search jobs submitted"),
        &["result"], // "completed", "failed", "timed_out", "cancelled"
    )
    .unwrap()
});

/// Waits performed per search job before it completed.
pub static SEARCH_WAIT_CYCLES: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "grabbit_search_wait_cycles",
            "Poll intervals waited per search job",
        )
        .buckets(vec![0.0, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]),
        &[],
    )
    .unwrap()
});

/// Results returned per completed search.
pub static SEARCH_RESULTS: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "grabbit_search_results",
            "Number of results per completed search",
        )
        .buckets(vec![0.0, 1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 500.0]),
        &[],
    )
    .unwrap()
});

// =============================================================================
// Download Metrics
// =============================================================================

/// Torrents submitted to the client by source.
pub static TORRENTS_ADDED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("grabbit_torrents_added_total", "Torrents submitted"),
        &["source"], // "magnet", "url", "file"
    )
    .unwrap()
});

/// Grabs that found nothing to add.
pub static GRABS_EMPTY: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "grabbit_grabs_empty_total",
        "Grab requests whose search returned no results",
    )
    .unwrap()
});

// =============================================================================
// Retention Metrics
// =============================================================================

/// Torrents removed by retention purges.
pub static TORRENTS_PURGED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "grabbit_torrents_purged_total",
        "Torrents removed by retention purges",
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Search
        Box::new(SEARCHES_TOTAL.clone()),
        Box::new(SEARCH_WAIT_CYCLES.clone()),
        Box::new(SEARCH_RESULTS.clone()),
        // Downloads
        Box::new(TORRENTS_ADDED.clone()),
        Box::new(GRABS_EMPTY.clone()),
        // Retention
        Box::new(TORRENTS_PURGED.clone()),
    ]
}
