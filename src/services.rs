//! Background service lifecycle management.
//!
//! `BackgroundServices` owns the periodic tasks spawned at startup, starting
//! them in dependency order and joining them after shutdown is signalled.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::core::aggregator::{ProcessMetricsSource, StatsAggregator};
use crate::core::connections::ConnectionEnumerator;
use crate::core::{ConnectionTable, Snapshot};
use crate::render;

/// Owns all periodic tasks for the process's lifetime.
///
/// Tasks are started in dependency order:
/// 1. Connection refresh loop (must run first so frames can resolve)
/// 2. Stats aggregator (1s ticks publishing snapshots)
/// 3. Renderer (consumes published snapshots)
pub struct BackgroundServices {
    handles: Vec<JoinHandle<()>>,
}

impl BackgroundServices {
    pub fn start<E, M>(
        connections: &Arc<ConnectionTable>,
        enumerator: Arc<E>,
        aggregator: StatsAggregator<M>,
        shutdown: &Arc<AtomicBool>,
    ) -> Self
    where
        E: ConnectionEnumerator,
        M: ProcessMetricsSource + 'static,
    {
        let (snapshot_tx, snapshot_rx) = watch::channel(Snapshot::new());

        let refresh = connections.start_refresh_loop(enumerator, Arc::clone(shutdown));
        let aggregate = aggregator.start(snapshot_tx, Arc::clone(shutdown));
        let renderer = tokio::spawn(render::run(snapshot_rx, Arc::clone(shutdown)));

        Self {
            handles: vec![refresh, aggregate, renderer],
        }
    }

    /// Wait for every task to observe the shutdown flag and finish its
    /// current cycle.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::warn!("background task panicked: {e}");
            }
        }
    }
}
