//! Periodic stats aggregation: process metrics + traffic counters + running
//! CPU statistics, merged into a sorted snapshot once per tick.
//!
//! The aggregator is the single owner of the threshold logger and its
//! logged-PID set; everything shared with the capture path goes through the
//! concurrent trackers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use sysinfo::{ProcessesToUpdate, System};
use tokio::sync::watch;

use crate::config::{self, Thresholds};
use crate::core::cpu_stats::CpuStatAccumulator;
use crate::core::threshold_log::ThresholdLogger;
use crate::core::traffic::TrafficTracker;

/// One process as observed by the metrics capability this tick.
#[derive(Debug, Clone)]
pub struct ProcessSample {
    pub pid: u32,
    pub name: String,
    /// Raw CPU percent since the previous sample, summed over cores.
    pub cpu_percent: f64,
    pub rss_bytes: u64,
}

/// Capability that enumerates visible processes with their metrics.
///
/// A process that vanished, turned zombie or denied access between ticks is
/// simply absent from the sample; one inaccessible process never aborts
/// enumeration of the rest.
pub trait ProcessMetricsSource: Send {
    fn logical_cores(&self) -> usize;
    fn sample_processes(&mut self) -> Vec<ProcessSample>;
}

/// Production metrics source backed by `sysinfo`.
pub struct SysinfoMetrics {
    system: System,
}

impl SysinfoMetrics {
    pub fn new() -> Self {
        Self {
            system: System::new_all(),
        }
    }
}

impl Default for SysinfoMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessMetricsSource for SysinfoMetrics {
    fn logical_cores(&self) -> usize {
        self.system.cpus().len()
    }

    fn sample_processes(&mut self) -> Vec<ProcessSample> {
        self.system.refresh_processes(ProcessesToUpdate::All, true);
        self.system
            .processes()
            .iter()
            .map(|(pid, process)| ProcessSample {
                pid: pid.as_u32(),
                name: process.name().to_string_lossy().into_owned(),
                cpu_percent: process.cpu_usage() as f64,
                rss_bytes: process.memory(),
            })
            .collect()
    }
}

/// Outcome of the threshold policy for one process this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub include: bool,
    pub should_log: bool,
}

/// Pure threshold policy, free of any I/O so it unit-tests deterministically.
pub fn classify(cpu_per_core: f64, ram_mb: f64, thresholds: &Thresholds) -> Decision {
    let cpu_hot = cpu_per_core >= thresholds.cpu_percent;
    Decision {
        include: cpu_hot || ram_mb >= thresholds.ram_mb,
        should_log: cpu_hot,
    }
}

/// One row of the published snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotRow {
    pub pid: u32,
    pub name: String,
    /// CPU percent per logical core since the last tick.
    pub cpu_percent: f64,
    /// Running population standard deviation of this process's CPU samples.
    pub cpu_stddev: f64,
    pub ram_mb: f64,
    /// Bytes uploaded during the last interval.
    pub upload_bytes: u64,
    /// Bytes downloaded during the last interval.
    pub download_bytes: u64,
    pub upload_kb_per_min: f64,
    pub download_kb_per_min: f64,
}

/// Full snapshot published each tick, sorted descending by CPU percent.
pub type Snapshot = Vec<SnapshotRow>;

/// Scale interval bytes to a KB/min rate.
fn kb_per_min(bytes: u64) -> f64 {
    bytes as f64 * 60.0 / 1024.0
}

/// Drives the aggregation tick: enumerate processes, apply the threshold
/// policy, merge CPU statistics with drained traffic counters, and build the
/// sorted snapshot.
pub struct StatsAggregator<M: ProcessMetricsSource> {
    metrics: M,
    traffic: Arc<TrafficTracker>,
    cpu_stats: CpuStatAccumulator,
    logger: ThresholdLogger,
    thresholds: Thresholds,
}

impl<M: ProcessMetricsSource> StatsAggregator<M> {
    pub fn new(
        metrics: M,
        traffic: Arc<TrafficTracker>,
        logger: ThresholdLogger,
        thresholds: Thresholds,
    ) -> Self {
        Self {
            metrics,
            traffic,
            cpu_stats: CpuStatAccumulator::new(),
            logger,
            thresholds,
        }
    }

    /// Run one aggregation cycle and return the snapshot. Empty when no
    /// process qualifies.
    pub fn tick(&mut self) -> Snapshot {
        let cores = self.metrics.logical_cores().max(1);
        let mut rows: Snapshot = Vec::new();

        for sample in self.metrics.sample_processes() {
            let cpu_per_core = sample.cpu_percent / cores as f64;
            let ram_mb = sample.rss_bytes as f64 / (1024.0 * 1024.0);

            let decision = classify(cpu_per_core, ram_mb, &self.thresholds);
            if !decision.include {
                continue;
            }

            let cpu_stddev = self.cpu_stats.record(sample.pid, cpu_per_core);
            let (upload_bytes, download_bytes) = self.traffic.drain(sample.pid);

            if decision.should_log {
                if let Err(e) = self.logger.maybe_log(sample.pid) {
                    tracing::error!("threshold log write failed for pid {}: {e}", sample.pid);
                }
            }

            rows.push(SnapshotRow {
                pid: sample.pid,
                name: sample.name,
                cpu_percent: cpu_per_core,
                cpu_stddev,
                ram_mb,
                upload_bytes,
                download_bytes,
                upload_kb_per_min: kb_per_min(upload_bytes),
                download_kb_per_min: kb_per_min(download_bytes),
            });
        }

        rows.sort_by(|a, b| {
            b.cpu_percent
                .partial_cmp(&a.cpu_percent)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        rows
    }

    /// Spawn the tick loop. Publishes each snapshot through the watch
    /// channel; runs until the shutdown flag is set.
    pub fn start(
        mut self,
        snapshot_tx: watch::Sender<Snapshot>,
        shutdown: Arc<AtomicBool>,
    ) -> tokio::task::JoinHandle<()>
    where
        M: 'static,
    {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_secs(
                config::STATS_INTERVAL_SECS,
            ));
            // The first sysinfo refresh has no baseline, so CPU percentages
            // from the very first tick are meaningless. Skip publishing it.
            ticker.tick().await;
            let _ = self.tick();

            while !shutdown.load(Ordering::Relaxed) {
                ticker.tick().await;
                let snapshot = self.tick();
                if snapshot_tx.send(snapshot).is_err() {
                    break;
                }
            }
            tracing::debug!("stats aggregator loop stopped");
        })
    }
}
