//! Maps transport port pairs to owning process IDs.
//!
//! Refreshes at 1s intervals via a dedicated tokio task. Results stored in a
//! DashMap<(local_port, remote_port), PID> for lock-free lookup from the
//! capture path. Both orderings of each port pair are inserted so a frame
//! resolves regardless of which endpoint its header presents first.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use netstat2::{AddressFamilyFlags, ProtocolFlags, ProtocolSocketInfo};

use crate::config;

/// One active connection as reported by the enumeration capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub local_port: u16,
    pub remote_port: u16,
    pub pid: u32,
}

/// Capability that lists currently active connections with owning PIDs.
pub trait ConnectionEnumerator: Send + Sync + 'static {
    fn active_connections(&self) -> Vec<ConnectionInfo>;
}

/// Production enumerator backed by the OS socket tables via `netstat2`.
///
/// Only fully-established endpoints count: a connection must expose a local
/// port, a non-zero remote port, and at least one owning PID.
pub struct NetstatEnumerator;

impl ConnectionEnumerator for NetstatEnumerator {
    fn active_connections(&self) -> Vec<ConnectionInfo> {
        let af = AddressFamilyFlags::IPV4 | AddressFamilyFlags::IPV6;
        let sockets = match netstat2::get_sockets_info(af, ProtocolFlags::TCP) {
            Ok(sockets) => sockets,
            Err(e) => {
                tracing::warn!("socket enumeration failed: {e}");
                return Vec::new();
            }
        };

        sockets
            .into_iter()
            .filter_map(|socket| {
                let pid = *socket.associated_pids.first()?;
                match socket.protocol_socket_info {
                    ProtocolSocketInfo::Tcp(tcp) if tcp.remote_port != 0 && pid != 0 => {
                        Some(ConnectionInfo {
                            local_port: tcp.local_port,
                            remote_port: tcp.remote_port,
                            pid,
                        })
                    }
                    _ => None,
                }
            })
            .collect()
    }
}

/// Port-pair to PID mapping shared between the refresh loop and the
/// packet classifier.
pub struct ConnectionTable {
    map: DashMap<(u16, u16), u32>,
}

impl ConnectionTable {
    pub fn new() -> Self {
        Self { map: DashMap::new() }
    }

    /// Rebuild the table from the newest enumeration.
    ///
    /// Inserts both orderings of every port pair, then evicts entries absent
    /// from this enumeration so closed connections cannot misattribute
    /// traffic after their ports are reused.
    pub fn refresh<E: ConnectionEnumerator + ?Sized>(&self, enumerator: &E) {
        let connections = enumerator.active_connections();
        let mut seen: HashSet<(u16, u16)> = HashSet::with_capacity(connections.len() * 2);

        for c in connections {
            self.map.insert((c.local_port, c.remote_port), c.pid);
            self.map.insert((c.remote_port, c.local_port), c.pid);
            seen.insert((c.local_port, c.remote_port));
            seen.insert((c.remote_port, c.local_port));
        }

        self.map.retain(|key, _| seen.contains(key));
    }

    /// Resolve a port pair to its owning PID. O(1).
    pub fn lookup(&self, a: u16, b: u16) -> Option<u32> {
        self.map.get(&(a, b)).map(|entry| *entry.value())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Spawn the refresh loop. Runs until the shutdown flag is set.
    pub fn start_refresh_loop<E: ConnectionEnumerator>(
        self: &Arc<Self>,
        enumerator: Arc<E>,
        shutdown: Arc<AtomicBool>,
    ) -> tokio::task::JoinHandle<()> {
        let table = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_secs(
                config::CONNECTION_REFRESH_INTERVAL_SECS,
            ));
            while !shutdown.load(Ordering::Relaxed) {
                ticker.tick().await;
                table.refresh(enumerator.as_ref());
            }
            tracing::debug!("connection refresh loop stopped");
        })
    }
}

impl Default for ConnectionTable {
    fn default() -> Self {
        Self::new()
    }
}
