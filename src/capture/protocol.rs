/// Layer-4 protocol seen in the IP header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Tcp,
    Udp,
    Icmp,
    Other,
}

/// Guess an application label from the transport and well-known ports.
///
/// Only a hint for display: the aggregator treats the label as opaque.
pub fn classify(transport: Transport, src_port: Option<u16>, dst_port: Option<u16>) -> &'static str {
    let uses = |ports: &[u16]| {
        src_port.map_or(false, |p| ports.contains(&p)) || dst_port.map_or(false, |p| ports.contains(&p))
    };

    match transport {
        Transport::Tcp => {
            if uses(&[80, 8080]) {
                "HTTP"
            } else if uses(&[443]) {
                "HTTPS"
            } else if uses(&[21]) {
                "FTP"
            } else {
                "TCP"
            }
        }
        Transport::Udp => {
            if uses(&[53]) {
                "DNS"
            } else {
                "UDP"
            }
        }
        Transport::Icmp => "ICMP",
        Transport::Other => "OTHER",
    }
}
