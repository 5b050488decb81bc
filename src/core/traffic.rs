//! Per-process traffic accounting using DashMap for lock-free concurrent access.
//!
//! The capture thread records bytes per PID; the stats aggregator drains the
//! counters once per tick so derived speeds cover only the latest interval.

use dashmap::DashMap;

/// Which side of the wire a frame was observed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Upload,
    Download,
}

/// Running byte counters for a single process.
#[derive(Debug, Default)]
struct TrafficCounters {
    upload: u64,
    download: u64,
}

/// Thread-safe traffic tracker. Keyed by PID.
pub struct TrafficTracker {
    counters: DashMap<u32, TrafficCounters>,
}

impl TrafficTracker {
    pub fn new() -> Self {
        Self {
            counters: DashMap::new(),
        }
    }

    /// Record bytes for a process. Called from the capture loop.
    pub fn record(&self, pid: u32, direction: Direction, len: u64) {
        let mut entry = self.counters.entry(pid).or_default();
        match direction {
            Direction::Upload => entry.upload += len,
            Direction::Download => entry.download += len,
        }
    }

    /// Read and zero a process's counters in one exclusive access.
    ///
    /// Returns `(upload_bytes, download_bytes)` accumulated since the last
    /// drain. The shard lock held by `get_mut` guarantees the pair is never
    /// observed torn by a concurrent `record`.
    pub fn drain(&self, pid: u32) -> (u64, u64) {
        match self.counters.get_mut(&pid) {
            Some(mut entry) => {
                let c = entry.value_mut();
                let drained = (c.upload, c.download);
                c.upload = 0;
                c.download = 0;
                drained
            }
            None => (0, 0),
        }
    }

    /// Current counter values without resetting them.
    pub fn peek(&self, pid: u32) -> (u64, u64) {
        self.counters
            .get(&pid)
            .map(|c| (c.upload, c.download))
            .unwrap_or((0, 0))
    }

    /// Number of processes with at least one recorded frame.
    pub fn tracked_processes(&self) -> usize {
        self.counters.len()
    }
}

impl Default for TrafficTracker {
    fn default() -> Self {
        Self::new()
    }
}
