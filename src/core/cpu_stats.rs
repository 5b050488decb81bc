//! Running CPU usage statistics per process.
//!
//! Keeps sum, sum of squares and sample count per PID so a population
//! standard deviation can be derived incrementally. Samples accumulate for
//! the whole run and are never reset; a process that only qualifies
//! intermittently simply has a sparser statistic.

use dashmap::DashMap;

#[derive(Debug, Default)]
struct CpuStat {
    count: u64,
    sum: f64,
    sum_sq: f64,
}

impl CpuStat {
    /// Population standard deviation: sqrt(E[X^2] - E[X]^2).
    ///
    /// Defined as 0 for fewer than two samples; the radicand is clamped at
    /// zero against floating-point cancellation.
    fn stddev(&self) -> f64 {
        if self.count <= 1 {
            return 0.0;
        }
        let n = self.count as f64;
        let mean = self.sum / n;
        let mean_sq = self.sum_sq / n;
        (mean_sq - mean * mean).max(0.0).sqrt()
    }
}

/// Thread-safe accumulator keyed by PID.
pub struct CpuStatAccumulator {
    stats: DashMap<u32, CpuStat>,
}

impl CpuStatAccumulator {
    pub fn new() -> Self {
        Self {
            stats: DashMap::new(),
        }
    }

    /// Add one CPU sample for a process and return the updated running
    /// standard deviation.
    pub fn record(&self, pid: u32, cpu_percent: f64) -> f64 {
        let mut entry = self.stats.entry(pid).or_default();
        let stat = entry.value_mut();
        stat.count += 1;
        stat.sum += cpu_percent;
        stat.sum_sq += cpu_percent * cpu_percent;
        stat.stddev()
    }

    /// Number of samples recorded for a PID so far.
    pub fn sample_count(&self, pid: u32) -> u64 {
        self.stats.get(&pid).map(|s| s.count).unwrap_or(0)
    }
}

impl Default for CpuStatAccumulator {
    fn default() -> Self {
        Self::new()
    }
}
