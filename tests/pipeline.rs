//! End-to-end pipeline test with mock capabilities: captured frames flow
//! through the classifier into traffic counters, and the aggregator merges
//! them with process metrics into a sorted, threshold-filtered snapshot.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use pnet::datalink::MacAddr;

use netsentry::config::Thresholds;
use netsentry::core::aggregator::{ProcessMetricsSource, ProcessSample};
use netsentry::core::connections::{ConnectionEnumerator, ConnectionInfo};
use netsentry::core::{
    ConnectionTable, PacketClassifier, StatsAggregator, ThresholdLogger, TrafficTracker,
};

const LOCAL_MAC: MacAddr = MacAddr(0x02, 0xAA, 0, 0, 0, 0x01);
const REMOTE_MAC: MacAddr = MacAddr(0x02, 0xBB, 0, 0, 0, 0x02);

struct StaticEnumerator(Vec<ConnectionInfo>);

impl ConnectionEnumerator for StaticEnumerator {
    fn active_connections(&self) -> Vec<ConnectionInfo> {
        self.0.clone()
    }
}

struct StaticMetrics(Vec<ProcessSample>);

impl ProcessMetricsSource for StaticMetrics {
    fn logical_cores(&self) -> usize {
        1
    }
    fn sample_processes(&mut self) -> Vec<ProcessSample> {
        self.0.clone()
    }
}

/// Minimal Ethernet + IPv4 + TCP frame carrying `payload_len` extra bytes.
fn tcp_frame(src_mac: MacAddr, src_port: u16, dst_port: u16, payload_len: usize) -> Vec<u8> {
    let ip_total = 20 + 20 + payload_len;
    let mut frame = vec![0u8; 14 + ip_total];
    frame[6..12].copy_from_slice(&[
        src_mac.0, src_mac.1, src_mac.2, src_mac.3, src_mac.4, src_mac.5,
    ]);
    frame[12] = 0x08; // IPv4
    frame[14] = 0x45;
    frame[16] = (ip_total >> 8) as u8;
    frame[17] = (ip_total & 0xFF) as u8;
    frame[23] = 6; // TCP
    frame[34] = (src_port >> 8) as u8;
    frame[35] = (src_port & 0xFF) as u8;
    frame[36] = (dst_port >> 8) as u8;
    frame[37] = (dst_port & 0xFF) as u8;
    frame[46] = 0x50; // data offset: 5 words
    frame
}

fn temp_log(tag: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "netsentry-pipeline-{tag}-{}.log",
        std::process::id()
    ));
    let _ = std::fs::remove_file(&path);
    path
}

fn sample(pid: u32, name: &str, cpu: f64, ram_mb: u64) -> ProcessSample {
    ProcessSample {
        pid,
        name: name.into(),
        cpu_percent: cpu,
        rss_bytes: ram_mb * 1024 * 1024,
    }
}

#[test]
fn frames_flow_through_to_a_sorted_threshold_filtered_snapshot() {
    let log = temp_log("e2e");

    // Two live connections: browser (pid 10) and sync client (pid 20).
    let table = Arc::new(ConnectionTable::new());
    table.refresh(&StaticEnumerator(vec![
        ConnectionInfo {
            local_port: 50001,
            remote_port: 443,
            pid: 10,
        },
        ConnectionInfo {
            local_port: 50002,
            remote_port: 8080,
            pid: 20,
        },
    ]));

    let traffic = Arc::new(TrafficTracker::new());
    let classifier = PacketClassifier::new(
        Arc::clone(&table),
        Arc::clone(&traffic),
        HashSet::from([LOCAL_MAC]),
    );

    // Browser: one outbound request, one large inbound response (the
    // response frame presents the ports remote-first).
    let request = tcp_frame(LOCAL_MAC, 50001, 443, 100);
    let response = tcp_frame(REMOTE_MAC, 443, 50001, 1400);
    classifier.handle_frame(&request);
    classifier.handle_frame(&response);

    // Sync client: upload only.
    let upload = tcp_frame(LOCAL_MAC, 50002, 8080, 600);
    classifier.handle_frame(&upload);

    // Noise: unknown connection and an unparseable frame. Neither counts.
    classifier.handle_frame(&tcp_frame(REMOTE_MAC, 1, 2, 999));
    classifier.handle_frame(&[0u8; 6]);

    // pid 30 is busy but generated no traffic; pid 40 is below both
    // thresholds and must not appear at all.
    let metrics = StaticMetrics(vec![
        sample(10, "browser", 6.0, 50),
        sample(20, "sync", 2.0, 150),
        sample(30, "builder", 75.0, 20),
        sample(40, "sleeper", 0.5, 5),
    ]);
    let mut aggregator = StatsAggregator::new(
        metrics,
        Arc::clone(&traffic),
        ThresholdLogger::new(&log),
        Thresholds {
            cpu_percent: 5.0,
            ram_mb: 100.0,
        },
    );

    let snapshot = aggregator.tick();

    let pids: Vec<u32> = snapshot.iter().map(|r| r.pid).collect();
    assert_eq!(pids, vec![30, 10, 20], "sorted descending by cpu");

    let browser = &snapshot[1];
    assert_eq!(browser.upload_bytes, request.len() as u64);
    assert_eq!(browser.download_bytes, response.len() as u64);
    let expected_up = request.len() as f64 * 60.0 / 1024.0;
    assert!((browser.upload_kb_per_min - expected_up).abs() < 1e-9);

    let sync = &snapshot[2];
    assert_eq!(sync.upload_bytes, upload.len() as u64);
    assert_eq!(sync.download_bytes, 0);

    let builder = &snapshot[0];
    assert_eq!(builder.upload_bytes, 0);
    assert_eq!(builder.download_bytes, 0);

    // Only the CPU-threshold crossers are logged, each exactly once even
    // after further ticks.
    aggregator.tick();
    aggregator.tick();
    let logged = std::fs::read_to_string(&log).unwrap();
    let mut lines: Vec<&str> = logged.lines().collect();
    lines.sort_unstable();
    assert_eq!(lines, vec!["10", "30"]);

    let _ = std::fs::remove_file(&log);
}

#[test]
fn drained_counters_restart_from_zero_each_tick() {
    let log = temp_log("drain");

    let table = Arc::new(ConnectionTable::new());
    table.refresh(&StaticEnumerator(vec![ConnectionInfo {
        local_port: 40000,
        remote_port: 22,
        pid: 7,
    }]));
    let traffic = Arc::new(TrafficTracker::new());
    let classifier = PacketClassifier::new(
        Arc::clone(&table),
        Arc::clone(&traffic),
        HashSet::from([LOCAL_MAC]),
    );

    let mut aggregator = StatsAggregator::new(
        StaticMetrics(vec![sample(7, "ssh", 50.0, 10)]),
        Arc::clone(&traffic),
        ThresholdLogger::new(&log),
        Thresholds {
            cpu_percent: 5.0,
            ram_mb: 100.0,
        },
    );

    let first = tcp_frame(LOCAL_MAC, 40000, 22, 1000);
    classifier.handle_frame(&first);
    assert_eq!(aggregator.tick()[0].upload_bytes, first.len() as u64);

    // After the drain, a new frame of length L reads as exactly L.
    let second = tcp_frame(LOCAL_MAC, 40000, 22, 10);
    classifier.handle_frame(&second);
    assert_eq!(aggregator.tick()[0].upload_bytes, second.len() as u64);

    let _ = std::fs::remove_file(&log);
}
