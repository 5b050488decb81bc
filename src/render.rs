//! Terminal snapshot renderer.
//!
//! Consumes published snapshots and redraws one table per tick. Purely a
//! presentation boundary: field set and sort order come straight from the
//! aggregator and are preserved as-is.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

use crate::core::Snapshot;

/// Human-readable byte size: 1536 -> "1.50KB".
pub fn format_bytes(bytes: u64) -> String {
    let mut value = bytes as f64;
    for unit in ["", "K", "M", "G", "T"] {
        if value < 1024.0 {
            return format!("{value:.2}{unit}B");
        }
        value /= 1024.0;
    }
    format!("{value:.2}PB")
}

/// Render the snapshot as an aligned table, or the explicit no-match notice.
pub fn render_table(snapshot: &Snapshot) -> String {
    if snapshot.is_empty() {
        return "No processes exceed the set thresholds.\n".to_string();
    }

    let mut out = String::new();
    out.push_str(&format!(
        "{:<8} {:<24} {:>7} {:>8} {:>9} {:>10} {:>10} {:>12} {:>12}\n",
        "PID", "NAME", "CPU%", "STDDEV", "RAM(MB)", "UPLOAD", "DOWNLOAD", "UP(KB/min)", "DOWN(KB/min)"
    ));
    for row in snapshot {
        out.push_str(&format!(
            "{:<8} {:<24.24} {:>7.2} {:>8.2} {:>9.2} {:>10} {:>10} {:>12.2} {:>12.2}\n",
            row.pid,
            row.name,
            row.cpu_percent,
            row.cpu_stddev,
            row.ram_mb,
            format_bytes(row.upload_bytes),
            format_bytes(row.download_bytes),
            row.upload_kb_per_min,
            row.download_kb_per_min,
        ));
    }
    out
}

/// Display loop: redraw the terminal each time a snapshot is published.
pub async fn run(mut snapshot_rx: watch::Receiver<Snapshot>, shutdown: Arc<AtomicBool>) {
    while snapshot_rx.changed().await.is_ok() {
        if shutdown.load(Ordering::Relaxed) {
            break;
        }
        let table = render_table(&snapshot_rx.borrow_and_update().clone());
        // Clear screen and home the cursor before each redraw.
        print!("\x1b[2J\x1b[H{table}");
        let _ = std::io::stdout().flush();
    }
    tracing::debug!("renderer stopped");
}
