//! Frame classification: resolve each captured frame to its owning process
//! and charge its byte length to that process's upload or download counter.
//!
//! Runs on the capture path for every delivered frame, so it never blocks
//! and never fails: anything unparseable or unresolvable is dropped silently
//! (ARP, ICMP, broadcast noise and port pairs with no table entry are all
//! expected at steady state).

use std::collections::HashSet;
use std::sync::Arc;

use pnet::datalink::MacAddr;
use pnet::packet::ethernet::{EtherTypes, EthernetPacket};
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::ipv6::Ipv6Packet;
use pnet::packet::tcp::TcpPacket;
use pnet::packet::udp::UdpPacket;
use pnet::packet::Packet;

use crate::core::connections::ConnectionTable;
use crate::core::traffic::{Direction, TrafficTracker};

/// Transport-level fields extracted from a raw link-layer frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedFrame {
    pub src_mac: MacAddr,
    pub src_port: u16,
    pub dst_port: u16,
}

/// Parse Ethernet -> IPv4/IPv6 -> TCP/UDP and extract source MAC + ports.
/// Returns None for frames without a TCP/UDP payload.
pub fn parse_frame(data: &[u8]) -> Option<ParsedFrame> {
    let eth = EthernetPacket::new(data)?;
    let src_mac = eth.get_source();

    let (next_proto, transport) = match eth.get_ethertype() {
        EtherTypes::Ipv4 => {
            let ip = Ipv4Packet::new(eth.payload())?;
            (ip.get_next_level_protocol(), ip.payload().to_vec())
        }
        EtherTypes::Ipv6 => {
            let ip = Ipv6Packet::new(eth.payload())?;
            (ip.get_next_header(), ip.payload().to_vec())
        }
        _ => return None,
    };

    let (src_port, dst_port) = match next_proto {
        IpNextHeaderProtocols::Tcp => {
            let tcp = TcpPacket::new(&transport)?;
            (tcp.get_source(), tcp.get_destination())
        }
        IpNextHeaderProtocols::Udp => {
            let udp = UdpPacket::new(&transport)?;
            (udp.get_source(), udp.get_destination())
        }
        _ => return None,
    };

    Some(ParsedFrame {
        src_mac,
        src_port,
        dst_port,
    })
}

/// Attributes captured frames to processes via the connection table.
pub struct PacketClassifier {
    connections: Arc<ConnectionTable>,
    traffic: Arc<TrafficTracker>,
    local_macs: HashSet<MacAddr>,
}

impl PacketClassifier {
    pub fn new(
        connections: Arc<ConnectionTable>,
        traffic: Arc<TrafficTracker>,
        local_macs: HashSet<MacAddr>,
    ) -> Self {
        Self {
            connections,
            traffic,
            local_macs,
        }
    }

    /// Classify one captured frame. Infallible by design.
    ///
    /// A frame sourced from one of our own interface MACs left this host
    /// (upload); everything else is inbound (download).
    pub fn handle_frame(&self, frame: &[u8]) {
        let Some(parsed) = parse_frame(frame) else {
            return;
        };
        let Some(pid) = self.connections.lookup(parsed.src_port, parsed.dst_port) else {
            return;
        };

        let direction = if self.local_macs.contains(&parsed.src_mac) {
            Direction::Upload
        } else {
            Direction::Download
        };
        self.traffic.record(pid, direction, frame.len() as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::connections::{ConnectionEnumerator, ConnectionInfo};

    const LOCAL_MAC: MacAddr = MacAddr(0x02, 0x00, 0x00, 0x00, 0x00, 0x01);
    const REMOTE_MAC: MacAddr = MacAddr(0x02, 0x00, 0x00, 0x00, 0x00, 0x02);

    struct FixedEnumerator(Vec<ConnectionInfo>);

    impl ConnectionEnumerator for FixedEnumerator {
        fn active_connections(&self) -> Vec<ConnectionInfo> {
            self.0.clone()
        }
    }

    /// Ethernet + IPv4 + TCP frame with the given source MAC and ports.
    /// 14-byte Ethernet header, 20-byte IPv4 header, 20-byte TCP header.
    fn build_tcp_frame(src_mac: MacAddr, src_port: u16, dst_port: u16) -> Vec<u8> {
        let mut frame = vec![0u8; 14 + 20 + 20];

        // Ethernet: destination MAC left zeroed, source MAC at bytes 6-11.
        frame[6] = src_mac.0;
        frame[7] = src_mac.1;
        frame[8] = src_mac.2;
        frame[9] = src_mac.3;
        frame[10] = src_mac.4;
        frame[11] = src_mac.5;
        // Ethertype 0x0800 = IPv4.
        frame[12] = 0x08;
        frame[13] = 0x00;

        // IPv4: version 4, IHL 5 (20 bytes).
        frame[14] = 0x45;
        // Total length = 40 (IP header + TCP header).
        frame[16] = 0;
        frame[17] = 40;
        // Protocol 6 = TCP.
        frame[23] = 6;

        // TCP ports, big-endian.
        frame[34] = (src_port >> 8) as u8;
        frame[35] = (src_port & 0xFF) as u8;
        frame[36] = (dst_port >> 8) as u8;
        frame[37] = (dst_port & 0xFF) as u8;
        // Data offset: 5 words (20-byte header).
        frame[46] = 0x50;

        frame
    }

    /// Ethernet + ARP frame: no transport ports at all.
    fn build_arp_frame() -> Vec<u8> {
        let mut frame = vec![0u8; 42];
        frame[12] = 0x08;
        frame[13] = 0x06; // Ethertype 0x0806 = ARP
        frame
    }

    fn classifier_with_connection(
        src_port: u16,
        dst_port: u16,
        pid: u32,
    ) -> (PacketClassifier, Arc<TrafficTracker>) {
        let table = Arc::new(ConnectionTable::new());
        table.refresh(&FixedEnumerator(vec![ConnectionInfo {
            local_port: src_port,
            remote_port: dst_port,
            pid,
        }]));
        let traffic = Arc::new(TrafficTracker::new());
        let classifier = PacketClassifier::new(
            table,
            Arc::clone(&traffic),
            HashSet::from([LOCAL_MAC]),
        );
        (classifier, traffic)
    }

    #[test]
    fn test_parse_extracts_mac_and_tcp_ports() {
        let frame = build_tcp_frame(LOCAL_MAC, 5000, 80);
        let parsed = parse_frame(&frame).unwrap();
        assert_eq!(parsed.src_mac, LOCAL_MAC);
        assert_eq!(parsed.src_port, 5000);
        assert_eq!(parsed.dst_port, 80);
    }

    #[test]
    fn test_parse_rejects_empty_and_truncated_frames() {
        assert!(parse_frame(&[]).is_none());
        assert!(parse_frame(&[0u8; 10]).is_none());
        // Valid Ethernet + IPv4 headers but no room for a TCP header.
        let mut truncated = build_tcp_frame(LOCAL_MAC, 5000, 80);
        truncated.truncate(14 + 20 + 4);
        assert!(parse_frame(&truncated).is_none());
    }

    #[test]
    fn test_parse_rejects_non_transport_frames() {
        assert!(parse_frame(&build_arp_frame()).is_none());
        // ICMP: IPv4 with protocol byte 1.
        let mut icmp = build_tcp_frame(LOCAL_MAC, 0, 0);
        icmp[23] = 1;
        assert!(parse_frame(&icmp).is_none());
    }

    #[test]
    fn test_frame_from_local_mac_counts_as_upload() {
        let (classifier, traffic) = classifier_with_connection(5000, 80, 1234);
        let frame = build_tcp_frame(LOCAL_MAC, 5000, 80);
        classifier.handle_frame(&frame);
        assert_eq!(traffic.peek(1234), (frame.len() as u64, 0));
    }

    #[test]
    fn test_frame_from_foreign_mac_counts_as_download() {
        let (classifier, traffic) = classifier_with_connection(5000, 80, 1234);
        // Reply direction: remote endpoint's ports are swapped, and the
        // table resolves either ordering.
        let frame = build_tcp_frame(REMOTE_MAC, 80, 5000);
        classifier.handle_frame(&frame);
        assert_eq!(traffic.peek(1234), (0, frame.len() as u64));
    }

    #[test]
    fn test_unresolvable_port_pair_changes_nothing() {
        let (classifier, traffic) = classifier_with_connection(5000, 80, 1234);
        classifier.handle_frame(&build_tcp_frame(LOCAL_MAC, 1111, 2222));
        assert_eq!(traffic.peek(1234), (0, 0));
        assert_eq!(traffic.tracked_processes(), 0);
    }

    #[test]
    fn test_portless_frame_changes_nothing() {
        let (classifier, traffic) = classifier_with_connection(5000, 80, 1234);
        classifier.handle_frame(&build_arp_frame());
        assert_eq!(traffic.tracked_processes(), 0);
    }
}
