//! Append-only audit log of processes that crossed the CPU threshold.
//!
//! One PID per line, written the first time that process's CPU usage crosses
//! the configured threshold. The file is created on first write and never
//! truncated or rotated.

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use crate::error::AppError;

pub struct ThresholdLogger {
    path: PathBuf,
    logged: HashSet<u32>,
}

impl ThresholdLogger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            logged: HashSet::new(),
        }
    }

    /// Append `pid` to the log if it has not been logged this run.
    ///
    /// PID 0 (the idle/system pseudo-process) is never logged. Returns
    /// `Ok(true)` when a line was written. A write failure leaves the PID
    /// unmarked so the append is retried on the next qualifying tick.
    pub fn maybe_log(&mut self, pid: u32) -> Result<bool, AppError> {
        if pid == 0 || self.logged.contains(&pid) {
            return Ok(false);
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| AppError::Persistence(format!("open {}: {e}", self.path.display())))?;
        writeln!(file, "{pid}")
            .map_err(|e| AppError::Persistence(format!("append {}: {e}", self.path.display())))?;

        self.logged.insert(pid);
        Ok(true)
    }

    pub fn logged_count(&self) -> usize {
        self.logged.len()
    }
}
