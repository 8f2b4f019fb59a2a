use std::path::Path;

use log::{info, warn};
use pcap::{Active, Capture, Device, Offline};
use pnet::packet::ethernet::{EtherType, EtherTypes, EthernetPacket};
use pnet::packet::ip::{IpNextHeaderProtocol, IpNextHeaderProtocols};
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::ipv6::Ipv6Packet;
use pnet::packet::tcp::TcpPacket;
use pnet::packet::udp::UdpPacket;
use pnet::packet::Packet;

use thiserror::Error;

use crate::aggregation::TrafficEvent;
use crate::capture::protocol::{classify, Transport};
use crate::config::CaptureConfig;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Insufficient privileges ({0}). Try: sudo setcap cap_net_raw,cap_net_admin=eip ./server-traffic-monitor")]
    InsufficientPrivileges(String),

    #[error("Network interface '{0}' not found. Available interfaces: {1:?}")]
    InterfaceNotFound(String, Vec<String>),

    #[error("Cannot open capture file '{0}': {1}")]
    OfflineFile(String, String),

    #[error("Packet read failed: {0}")]
    Read(String),

    #[error("Device error: {0}")]
    DeviceError(String),
}

/// Outcome of one read from the capture handle.
#[derive(Debug, Clone, PartialEq)]
pub enum CapturedFrame {
    Event(TrafficEvent),
    /// Frame without an IPv4/IPv6 header we can attribute.
    NonIp,
    /// Live read timed out with nothing captured.
    Idle,
    /// Offline file fully replayed.
    Exhausted,
}

/// Link-layer framing of the captured data, from the pcap DLT value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkLayer {
    Ethernet,
    LinuxSll,
    RawIp,
    Unsupported(i32),
}

impl LinkLayer {
    pub fn from_dlt(dlt: i32) -> Self {
        match dlt {
            1 => LinkLayer::Ethernet,
            113 => LinkLayer::LinuxSll,
            12 | 14 | 101 => LinkLayer::RawIp,
            other => LinkLayer::Unsupported(other),
        }
    }
}

const SLL_HEADER_LEN: usize = 16;

/// Only permission failures get the setcap hint; anything else keeps libpcap's text.
fn open_failure(interface: &str, message: &str) -> CaptureError {
    let lower = message.to_lowercase();
    if lower.contains("permission") || lower.contains("not permitted") {
        CaptureError::InsufficientPrivileges(format!("{}: {}", interface, message))
    } else {
        CaptureError::DeviceError(format!("{}: {}", interface, message))
    }
}

enum CaptureSource {
    Live(Capture<Active>),
    Offline(Capture<Offline>),
}

pub struct PcapEngine {
    source: CaptureSource,
    link: LinkLayer,
    name: String,
}

impl PcapEngine {
    /// Opens the replay file when one is configured, otherwise the live device.
    pub fn from_config(config: &CaptureConfig) -> Result<Self, CaptureError> {
        match &config.pcap_file {
            Some(path) => Self::open_offline(path),
            None => Self::open_live(config),
        }
    }

    pub fn open_live(config: &CaptureConfig) -> Result<Self, CaptureError> {
        let available = Self::list_devices()?;

        let interface = config.interface.clone().unwrap_or_else(|| {
            available
                .first()
                .cloned()
                .unwrap_or_else(|| "any".to_string())
        });

        if interface != "any" && !available.iter().any(|name| *name == interface) {
            return Err(CaptureError::InterfaceNotFound(interface, available));
        }

        info!("Opening live capture on interface: {}", interface);

        let device = Device::from(interface.as_str());
        let capture = Capture::from_device(device)
            .map_err(|e| CaptureError::DeviceError(e.to_string()))?
            .promisc(config.promiscuous)
            .snaplen(config.snaplen)
            .timeout(config.timeout_ms)
            .open()
            .map_err(|e| {
                warn!("Failed to open capture device {}: {}", interface, e);
                open_failure(&interface, &e.to_string())
            })?;

        let link = LinkLayer::from_dlt(capture.get_datalink().0);
        Ok(Self::with_source(CaptureSource::Live(capture), link, interface))
    }

    pub fn open_offline(path: &Path) -> Result<Self, CaptureError> {
        let display = path.display().to_string();
        let capture = Capture::from_file(path)
            .map_err(|e| CaptureError::OfflineFile(display.clone(), e.to_string()))?;

        info!("Replaying capture file: {}", display);

        let link = LinkLayer::from_dlt(capture.get_datalink().0);
        Ok(Self::with_source(CaptureSource::Offline(capture), link, display))
    }

    fn with_source(source: CaptureSource, link: LinkLayer, name: String) -> Self {
        if let LinkLayer::Unsupported(dlt) = link {
            warn!("Unsupported link type {} on {}; frames will be skipped", dlt, name);
        }
        Self { source, link, name }
    }

    pub fn list_devices() -> Result<Vec<String>, CaptureError> {
        Device::list()
            .map(|devices| devices.into_iter().map(|d| d.name).collect())
            .map_err(|e| CaptureError::DeviceError(format!("Failed to list devices: {}", e)))
    }

    pub fn next_frame(&mut self) -> Result<CapturedFrame, CaptureError> {
        let next = match &mut self.source {
            CaptureSource::Live(capture) => capture.next_packet(),
            CaptureSource::Offline(capture) => capture.next_packet(),
        };

        match next {
            Ok(packet) => {
                let header = packet.header;
                let timestamp = header.ts.tv_sec as f64 + header.ts.tv_usec as f64 / 1_000_000.0;
                Ok(decode_frame(self.link, packet.data, timestamp, u64::from(header.len)))
            }
            Err(pcap::Error::TimeoutExpired) => Ok(CapturedFrame::Idle),
            Err(pcap::Error::NoMorePackets) => {
                info!("Finished replaying {}", self.name);
                Ok(CapturedFrame::Exhausted)
            }
            Err(e) => Err(CaptureError::Read(e.to_string())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Decodes one captured frame into an event. `byte_size` is the on-wire length.
pub fn decode_frame(link: LinkLayer, data: &[u8], timestamp: f64, byte_size: u64) -> CapturedFrame {
    let network = match link {
        LinkLayer::Ethernet => EthernetPacket::new(data)
            .map(|frame| (frame.get_ethertype(), frame.payload().to_vec())),
        LinkLayer::LinuxSll => {
            if data.len() < SLL_HEADER_LEN {
                None
            } else {
                let ethertype = EtherType(u16::from_be_bytes([data[14], data[15]]));
                Some((ethertype, data[SLL_HEADER_LEN..].to_vec()))
            }
        }
        LinkLayer::RawIp => match data.first().map(|b| b >> 4) {
            Some(4) => Some((EtherTypes::Ipv4, data.to_vec())),
            Some(6) => Some((EtherTypes::Ipv6, data.to_vec())),
            _ => None,
        },
        LinkLayer::Unsupported(_) => None,
    };

    let Some((ethertype, payload)) = network else {
        return CapturedFrame::NonIp;
    };

    match decode_ip(ethertype, &payload) {
        Some((source, destination, protocol)) => CapturedFrame::Event(TrafficEvent {
            timestamp,
            source,
            destination,
            byte_size,
            protocol: protocol.to_string(),
        }),
        None => CapturedFrame::NonIp,
    }
}

fn decode_ip(ethertype: EtherType, payload: &[u8]) -> Option<(String, String, &'static str)> {
    match ethertype {
        EtherTypes::Ipv4 => {
            let ipv4 = Ipv4Packet::new(payload)?;
            let label = label_transport(ipv4.get_next_level_protocol(), ipv4.payload());
            Some((ipv4.get_source().to_string(), ipv4.get_destination().to_string(), label))
        }
        EtherTypes::Ipv6 => {
            let ipv6 = Ipv6Packet::new(payload)?;
            let label = label_transport(ipv6.get_next_header(), ipv6.payload());
            Some((ipv6.get_source().to_string(), ipv6.get_destination().to_string(), label))
        }
        _ => None,
    }
}

fn label_transport(next: IpNextHeaderProtocol, l4: &[u8]) -> &'static str {
    match next {
        IpNextHeaderProtocols::Tcp => {
            let ports = TcpPacket::new(l4).map(|tcp| (tcp.get_source(), tcp.get_destination()));
            classify(Transport::Tcp, ports.map(|p| p.0), ports.map(|p| p.1))
        }
        IpNextHeaderProtocols::Udp => {
            let ports = UdpPacket::new(l4).map(|udp| (udp.get_source(), udp.get_destination()));
            classify(Transport::Udp, ports.map(|p| p.0), ports.map(|p| p.1))
        }
        IpNextHeaderProtocols::Icmp | IpNextHeaderProtocols::Icmpv6 => classify(Transport::Icmp, None, None),
        _ => classify(Transport::Other, None, None),
    }
}
