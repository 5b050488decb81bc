//! Centralized runtime constants and startup configuration.
//!
//! All tunable cadences are collected here so they can be found and adjusted
//! in a single place rather than scattered across modules.

use std::path::PathBuf;

/// Interval at which the stats aggregator ticks and publishes a snapshot (seconds).
pub const STATS_INTERVAL_SECS: u64 = 1;

/// Interval at which the connection table is rebuilt from the OS socket tables (seconds).
pub const CONNECTION_REFRESH_INTERVAL_SECS: u64 = 1;

/// Read timeout on the capture channel, bounding shutdown latency (milliseconds).
pub const CAPTURE_READ_TIMEOUT_MS: u64 = 500;

/// Inclusion thresholds supplied at startup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// CPU utilization threshold, percent per logical core.
    pub cpu_percent: f64,
    /// Resident memory threshold in megabytes.
    pub ram_mb: f64,
}

/// Full runtime configuration assembled from the CLI.
#[derive(Debug, Clone)]
pub struct Config {
    pub thresholds: Thresholds,
    /// Capture interface name; `None` picks the first usable interface.
    pub interface: Option<String>,
    /// Path of the append-only threshold log.
    pub log_file: PathBuf,
}
