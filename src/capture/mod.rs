//! Link-layer packet capture via `pnet` datalink channels.
//!
//! The capture loop runs on a dedicated OS thread (datalink reads are
//! blocking) and hands every received frame to the classifier. A short read
//! timeout keeps the loop responsive to the shared shutdown flag, so the
//! capture path honors the same cancellation signal as the periodic loops.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use pnet::datalink::{self, Channel, MacAddr, NetworkInterface};

use crate::config;
use crate::core::PacketClassifier;

/// Hardware addresses of all local network interfaces.
///
/// Used by the classifier to decide frame direction: a frame sourced from
/// one of these MACs is an upload.
pub fn local_mac_addresses() -> HashSet<MacAddr> {
    datalink::interfaces()
        .iter()
        .filter_map(|iface| iface.mac)
        .collect()
}

/// Pick the capture interface: by name if given, otherwise the first up,
/// non-loopback interface with a hardware address.
pub fn select_interface(name: Option<&str>) -> anyhow::Result<NetworkInterface> {
    let interfaces = datalink::interfaces();
    match name {
        Some(name) => interfaces
            .into_iter()
            .find(|iface| iface.name == name)
            .with_context(|| format!("no such interface: {name}")),
        None => interfaces
            .into_iter()
            .find(|iface| iface.is_up() && !iface.is_loopback() && iface.mac.is_some())
            .context("no usable capture interface found"),
    }
}

/// Manages the background packet capture thread.
/// Implements Drop to signal shutdown on panic/exit.
pub struct CaptureEngine {
    shutdown: Arc<AtomicBool>,
    _capture_thread: Option<std::thread::JoinHandle<()>>,
}

impl CaptureEngine {
    /// Start sniffing on the given interface.
    pub fn start_sniff(
        interface: NetworkInterface,
        classifier: Arc<PacketClassifier>,
        shutdown: Arc<AtomicBool>,
    ) -> anyhow::Result<Self> {
        let shutdown_clone = Arc::clone(&shutdown);
        let iface_name = interface.name.clone();

        let thread = std::thread::Builder::new()
            .name("capture-sniff".into())
            .spawn(move || {
                if let Err(e) = run_sniff_loop(interface, classifier, shutdown_clone) {
                    tracing::error!("capture loop exited: {e:#}");
                }
            })?;

        tracing::info!("CaptureEngine started on {iface_name}");
        Ok(Self {
            shutdown,
            _capture_thread: Some(thread),
        })
    }

    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

impl Drop for CaptureEngine {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

fn run_sniff_loop(
    interface: NetworkInterface,
    classifier: Arc<PacketClassifier>,
    shutdown: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let channel_config = datalink::Config {
        read_timeout: Some(std::time::Duration::from_millis(
            config::CAPTURE_READ_TIMEOUT_MS,
        )),
        ..Default::default()
    };

    let (_tx, mut rx) = match datalink::channel(&interface, channel_config) {
        Ok(Channel::Ethernet(tx, rx)) => (tx, rx),
        Ok(_) => anyhow::bail!("unsupported channel type on {}", interface.name),
        Err(e) => {
            return Err(e).with_context(|| format!("opening capture on {}", interface.name))
        }
    };

    while !shutdown.load(Ordering::Relaxed) {
        match rx.next() {
            Ok(frame) => classifier.handle_frame(frame),
            Err(e)
                if e.kind() == std::io::ErrorKind::TimedOut
                    || e.kind() == std::io::ErrorKind::WouldBlock =>
            {
                continue;
            }
            Err(e) => return Err(e).context("reading from capture channel"),
        }
    }

    tracing::debug!("capture loop stopped");
    Ok(())
}
