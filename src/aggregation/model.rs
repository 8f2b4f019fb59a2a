use serde::Serialize;
use std::collections::HashMap;

/// Integer index of a tumbling window: `floor(timestamp / window_size)`.
pub type WindowIndex = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Direction {
    Inbound,
    Outbound,
}

/// One observed event, already extracted from the wire by the capture layer.
#[derive(Debug, Clone, PartialEq)]
pub struct TrafficEvent {
    pub timestamp: f64, // seconds since epoch
    pub source: String,
    pub destination: String,
    pub byte_size: u64,
    pub protocol: String,
}

impl TrafficEvent {
    pub fn new(
        timestamp: f64,
        source: impl Into<String>,
        destination: impl Into<String>,
        byte_size: u64,
        protocol: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            source: source.into(),
            destination: destination.into(),
            byte_size,
            protocol: protocol.into(),
        }
    }
}

/// Counters for one peer inside one window.
///
/// `inbound_bytes + outbound_bytes` always equals the sum of `protocol_bytes`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PeerStats {
    pub inbound_bytes: u64,
    pub outbound_bytes: u64,
    pub protocol_bytes: HashMap<String, u64>,
}

impl PeerStats {
    pub fn add(&mut self, direction: Direction, protocol: &str, bytes: u64) {
        match direction {
            Direction::Inbound => self.inbound_bytes = self.inbound_bytes.saturating_add(bytes),
            Direction::Outbound => self.outbound_bytes = self.outbound_bytes.saturating_add(bytes),
        }

        // get_mut first so the label is only allocated for a new bucket
        match self.protocol_bytes.get_mut(protocol) {
            Some(counter) => *counter = counter.saturating_add(bytes),
            None => {
                self.protocol_bytes.insert(protocol.to_string(), bytes);
            }
        }
    }

    pub fn total_bytes(&self) -> u64 {
        self.inbound_bytes.saturating_add(self.outbound_bytes)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Window {
    pub index: WindowIndex,
    pub total_bytes: u64,
    pub peers: HashMap<String, PeerStats>,
}

impl Window {
    pub fn new(index: WindowIndex) -> Self {
        Self {
            index,
            total_bytes: 0,
            peers: HashMap::new(),
        }
    }

    /// Folds one classified event into the peer's counters and the window total.
    pub fn fold(&mut self, peer: &str, direction: Direction, protocol: &str, bytes: u64) {
        if let Some(stats) = self.peers.get_mut(peer) {
            stats.add(direction, protocol, bytes);
        } else {
            let mut stats = PeerStats::default();
            stats.add(direction, protocol, bytes);
            self.peers.insert(peer.to_string(), stats);
        }
        self.total_bytes = self.total_bytes.saturating_add(bytes);
    }
}

/// Maps a timestamp in seconds to its window index, flooring toward negative infinity.
pub fn window_index_for(timestamp: f64, window_size_secs: u64) -> WindowIndex {
    (timestamp / window_size_secs as f64).floor() as WindowIndex
}

/// Same as [`window_index_for`] for integer-second timestamps.
pub fn window_index_for_secs(timestamp: i64, window_size_secs: u64) -> WindowIndex {
    timestamp.div_euclid(window_size_secs as i64)
}

pub fn window_start(index: WindowIndex, window_size_secs: u64) -> i64 {
    index.saturating_mul(window_size_secs as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_index_floors() {
        assert_eq!(window_index_for(100.0, 5), 20);
        assert_eq!(window_index_for(104.999, 5), 20);
        assert_eq!(window_index_for(105.0, 5), 21);
        assert_eq!(window_index_for(-0.5, 5), -1);
        assert_eq!(window_index_for_secs(-1, 5), -1);
        assert_eq!(window_index_for_secs(9, 5), 1);
        assert_eq!(window_start(21, 5), 105);
    }

    #[test]
    fn test_peer_stats_keeps_protocol_sum() {
        let mut stats = PeerStats::default();
        stats.add(Direction::Inbound, "TCP", 100);
        stats.add(Direction::Outbound, "UDP", 40);
        stats.add(Direction::Outbound, "TCP", 10);

        assert_eq!(stats.inbound_bytes, 100);
        assert_eq!(stats.outbound_bytes, 50);
        assert_eq!(stats.protocol_bytes["TCP"], 110);
        assert_eq!(stats.protocol_bytes.values().sum::<u64>(), stats.total_bytes());
    }

    #[test]
    fn test_window_fold_tracks_total() {
        let mut window = Window::new(7);
        window.fold("10.0.0.2", Direction::Inbound, "HTTP", 300);
        window.fold("10.0.0.3", Direction::Outbound, "DNS", 60);
        window.fold("10.0.0.2", Direction::Outbound, "", 0);

        assert_eq!(window.total_bytes, 360);
        assert_eq!(window.peers.len(), 2);
        assert_eq!(window.peers["10.0.0.2"].protocol_bytes[""], 0);
    }
}
