//! Core logic: traffic attribution, aggregation, and threshold policy.
//!
//! - [`ConnectionTable`] — port-pair to PID mapping, refreshed each second
//! - [`PacketClassifier`] — per-frame attribution and direction classification
//! - [`TrafficTracker`] — per-process byte counters with drain semantics
//! - [`CpuStatAccumulator`] — running mean/variance of CPU samples
//! - [`StatsAggregator`] — the periodic tick building sorted snapshots
//! - [`ThresholdLogger`] — append-only audit log of CPU threshold crossings

pub mod aggregator;
pub mod classifier;
pub mod connections;
pub mod cpu_stats;
pub mod threshold_log;
pub mod traffic;

pub use aggregator::{Snapshot, SnapshotRow, StatsAggregator, SysinfoMetrics};
pub use classifier::PacketClassifier;
pub use connections::{ConnectionTable, NetstatEnumerator};
pub use cpu_stats::CpuStatAccumulator;
pub use threshold_log::ThresholdLogger;
pub use traffic::TrafficTracker;
