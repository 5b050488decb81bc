pub mod capture;
pub mod config;
pub mod core;
pub mod error;
pub mod render;
pub mod services;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;

use crate::capture::CaptureEngine;
use crate::core::{
    ConnectionTable, NetstatEnumerator, PacketClassifier, StatsAggregator, SysinfoMetrics,
    ThresholdLogger, TrafficTracker,
};
use crate::services::BackgroundServices;

/// Wire the pipeline and run until interrupted.
///
/// One shutdown flag is shared by the capture thread, the connection refresh
/// loop, and the aggregator; Ctrl-C sets it and every context stops after
/// its current cycle.
pub async fn run(config: config::Config) -> anyhow::Result<()> {
    let shutdown = Arc::new(AtomicBool::new(false));

    let connections = Arc::new(ConnectionTable::new());
    let traffic = Arc::new(TrafficTracker::new());

    let aggregator = StatsAggregator::new(
        SysinfoMetrics::new(),
        Arc::clone(&traffic),
        ThresholdLogger::new(config.log_file.clone()),
        config.thresholds,
    );

    let services = BackgroundServices::start(
        &connections,
        Arc::new(NetstatEnumerator),
        aggregator,
        &shutdown,
    );

    let classifier = Arc::new(PacketClassifier::new(
        Arc::clone(&connections),
        Arc::clone(&traffic),
        capture::local_mac_addresses(),
    ));

    let engine = capture::select_interface(config.interface.as_deref()).and_then(|iface| {
        CaptureEngine::start_sniff(iface, classifier, Arc::clone(&shutdown))
    });
    let engine = match engine {
        Ok(engine) => Some(engine),
        Err(e) => {
            tracing::warn!("packet capture unavailable: {e:#}. Running in process-scan-only mode.");
            None
        }
    };

    tokio::signal::ctrl_c()
        .await
        .context("waiting for interrupt")?;
    tracing::info!("shutdown requested");

    shutdown.store(true, Ordering::Relaxed);
    if let Some(engine) = &engine {
        engine.stop();
    }
    services.join().await;
    Ok(())
}
