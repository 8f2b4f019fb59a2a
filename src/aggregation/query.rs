use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::aggregation::engine::SharedWindows;
use crate::aggregation::model::{window_index_for_secs, window_start, PeerStats, Window, WindowIndex};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeerSummary {
    pub address: String,
    pub inbound_bytes: u64,
    pub outbound_bytes: u64,
    pub total_bytes: u64,
}

/// Latest window with its peers ranked by volume. Empty store leaves the
/// window fields unset and `peers` empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LatestSummary {
    pub window_index: Option<WindowIndex>,
    pub start_ts: Option<i64>,
    pub end_ts: Option<i64>,
    pub total_bytes: u64,
    pub peers: Vec<PeerSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeerDetail {
    pub address: String,
    pub inbound_bytes: u64,
    pub outbound_bytes: u64,
    pub protocols: HashMap<String, u64>,
}

/// Owned copy of one window, peers ordered like [`LatestSummary`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowSnapshot {
    pub index: WindowIndex,
    pub start_ts: i64,
    pub end_ts: i64,
    pub total_bytes: u64,
    pub peers: Vec<PeerDetail>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowOverview {
    pub index: WindowIndex,
    pub start_ts: i64,
    pub end_ts: i64,
    pub total_bytes: u64,
    pub peer_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStatus {
    pub window_size_secs: u64,
    pub keep_windows: usize,
    pub windows_held: usize,
    pub latest_index: Option<WindowIndex>,
}

/// Read-only views over the shared window store.
///
/// Every call takes the store lock once and copies its result out, so callers
/// never hold the lock while rendering or serializing.
#[derive(Debug, Clone)]
pub struct QueryFacade {
    shared: Arc<SharedWindows>,
}

impl QueryFacade {
    pub(crate) fn new(shared: Arc<SharedWindows>) -> Self {
        Self { shared }
    }

    pub fn latest_summary(&self) -> LatestSummary {
        let store = self.shared.lock();
        let Some((index, window)) = store.latest() else {
            return LatestSummary::default();
        };

        let mut peers: Vec<PeerSummary> = window
            .peers
            .iter()
            .map(|(address, stats)| PeerSummary {
                address: address.clone(),
                inbound_bytes: stats.inbound_bytes,
                outbound_bytes: stats.outbound_bytes,
                total_bytes: stats.total_bytes(),
            })
            .collect();
        peers.sort_by(|a, b| {
            b.total_bytes
                .cmp(&a.total_bytes)
                .then_with(|| a.address.cmp(&b.address))
        });

        let (start_ts, end_ts) = self.bounds(index);
        LatestSummary {
            window_index: Some(index),
            start_ts: Some(start_ts),
            end_ts: Some(end_ts),
            total_bytes: window.total_bytes,
            peers,
        }
    }

    /// Window containing `timestamp` (integer seconds), if it is still held.
    pub fn window_at(&self, timestamp: i64) -> Option<WindowSnapshot> {
        let index = window_index_for_secs(timestamp, self.shared.window_size_secs);
        let store = self.shared.lock();
        store.get(index).map(|window| self.snapshot(window))
    }

    /// Protocol breakdown for `peer` in the latest window.
    pub fn protocols_for_peer(&self, peer: &str) -> Option<HashMap<String, u64>> {
        let store = self.shared.lock();
        let (_, window) = store.latest()?;
        window.peers.get(peer).map(|stats| stats.protocol_bytes.clone())
    }

    /// Held windows in insertion order, oldest first.
    pub fn windows(&self) -> Vec<WindowOverview> {
        let store = self.shared.lock();
        store
            .iter()
            .map(|window| {
                let (start_ts, end_ts) = self.bounds(window.index);
                WindowOverview {
                    index: window.index,
                    start_ts,
                    end_ts,
                    total_bytes: window.total_bytes,
                    peer_count: window.peers.len(),
                }
            })
            .collect()
    }

    pub fn status(&self) -> StoreStatus {
        let store = self.shared.lock();
        StoreStatus {
            window_size_secs: self.shared.window_size_secs,
            keep_windows: store.capacity(),
            windows_held: store.len(),
            latest_index: store.latest().map(|(index, _)| index),
        }
    }

    pub fn window_size_secs(&self) -> u64 {
        self.shared.window_size_secs
    }

    fn bounds(&self, index: WindowIndex) -> (i64, i64) {
        let start = window_start(index, self.shared.window_size_secs);
        (start, start.saturating_add(self.shared.window_size_secs as i64))
    }

    fn snapshot(&self, window: &Window) -> WindowSnapshot {
        let mut peers: Vec<PeerDetail> = window
            .peers
            .iter()
            .map(|(address, stats)| peer_detail(address, stats))
            .collect();
        peers.sort_by(|a, b| {
            let a_total = a.inbound_bytes.saturating_add(a.outbound_bytes);
            let b_total = b.inbound_bytes.saturating_add(b.outbound_bytes);
            b_total.cmp(&a_total).then_with(|| a.address.cmp(&b.address))
        });

        let (start_ts, end_ts) = self.bounds(window.index);
        WindowSnapshot {
            index: window.index,
            start_ts,
            end_ts,
            total_bytes: window.total_bytes,
            peers,
        }
    }
}

fn peer_detail(address: &str, stats: &PeerStats) -> PeerDetail {
    PeerDetail {
        address: address.to_string(),
        inbound_bytes: stats.inbound_bytes,
        outbound_bytes: stats.outbound_bytes,
        protocols: stats.protocol_bytes.clone(),
    }
}

#[cfg(test)]
mod tests {
    use crate::aggregation::{AggregationEngine, TrafficEvent};

    const SERVER: &str = "10.0.0.5";

    #[test]
    fn test_two_packet_scenario() {
        let engine = AggregationEngine::new(5, 10).unwrap();
        engine.record(&TrafficEvent::new(100.0, "10.0.0.2", SERVER, 100, "TCP"), SERVER);
        engine.record(&TrafficEvent::new(100.1, SERVER, "10.0.0.2", 150, "TCP"), SERVER);

        let query = engine.query();
        let summary = query.latest_summary();
        assert_eq!(summary.window_index, Some(20));
        assert_eq!(summary.start_ts, Some(100));
        assert_eq!(summary.end_ts, Some(105));
        assert_eq!(summary.peers.len(), 1);

        let peer = &summary.peers[0];
        assert_eq!(peer.address, "10.0.0.2");
        assert_eq!(peer.inbound_bytes, 100);
        assert_eq!(peer.outbound_bytes, 150);
        assert_eq!(peer.total_bytes, 250);

        let protocols = query.protocols_for_peer("10.0.0.2").unwrap();
        assert_eq!(protocols.len(), 1);
        assert_eq!(protocols["TCP"], 250);
    }

    #[test]
    fn test_empty_store_queries() {
        let engine = AggregationEngine::new(5, 10).unwrap();
        let query = engine.query();

        let summary = query.latest_summary();
        assert_eq!(summary.window_index, None);
        assert!(summary.peers.is_empty());
        assert!(query.window_at(100).is_none());
        assert!(query.protocols_for_peer("10.0.0.2").is_none());
        assert!(query.windows().is_empty());
        assert_eq!(query.status().latest_index, None);
    }

    #[test]
    fn test_peers_ranked_by_volume_then_address() {
        let engine = AggregationEngine::new(5, 10).unwrap();
        engine.record(&TrafficEvent::new(0.0, "10.0.0.9", SERVER, 10, "UDP"), SERVER);
        engine.record(&TrafficEvent::new(0.0, "10.0.0.3", SERVER, 500, "TCP"), SERVER);
        engine.record(&TrafficEvent::new(0.0, "10.0.0.1", SERVER, 10, "UDP"), SERVER);

        let order: Vec<String> = engine
            .query()
            .latest_summary()
            .peers
            .into_iter()
            .map(|p| p.address)
            .collect();
        assert_eq!(order, vec!["10.0.0.3", "10.0.0.1", "10.0.0.9"]);
    }

    #[test]
    fn test_window_at_lookup() {
        let engine = AggregationEngine::new(5, 10).unwrap();
        engine.record(&TrafficEvent::new(102.5, "10.0.0.2", SERVER, 80, "HTTP"), SERVER);

        let query = engine.query();
        let window = query.window_at(100).unwrap();
        assert_eq!(window.index, 20);
        assert_eq!(window.total_bytes, 80);
        assert_eq!(window.peers[0].protocols["HTTP"], 80);
        // any second inside the window resolves to it
        assert_eq!(query.window_at(104).unwrap().index, 20);
        assert!(query.window_at(105).is_none());
    }

    #[test]
    fn test_unknown_peer_is_none() {
        let engine = AggregationEngine::new(5, 10).unwrap();
        engine.record(&TrafficEvent::new(0.0, "10.0.0.2", SERVER, 1, "TCP"), SERVER);
        assert!(engine.query().protocols_for_peer("10.0.0.99").is_none());
    }

    #[test]
    fn test_latest_follows_insertion_under_out_of_order_input() {
        let engine = AggregationEngine::new(5, 10).unwrap();
        engine.record(&TrafficEvent::new(200.0, "10.0.0.2", SERVER, 1, "TCP"), SERVER);
        engine.record(&TrafficEvent::new(100.0, "10.0.0.3", SERVER, 1, "TCP"), SERVER);

        let query = engine.query();
        assert_eq!(query.latest_summary().window_index, Some(20));
        assert!(query.protocols_for_peer("10.0.0.2").is_none());

        let indices: Vec<i64> = query.windows().iter().map(|w| w.index).collect();
        assert_eq!(indices, vec![40, 20]);
    }

    #[test]
    fn test_queries_are_idempotent() {
        let engine = AggregationEngine::new(5, 10).unwrap();
        engine.record(&TrafficEvent::new(0.0, "10.0.0.2", SERVER, 7, "TCP"), SERVER);
        engine.record(&TrafficEvent::new(0.0, SERVER, "10.0.0.4", 7, "TCP"), SERVER);

        let query = engine.query();
        assert_eq!(query.latest_summary(), query.latest_summary());
        assert_eq!(query.windows(), query.windows());
    }

    #[test]
    fn test_status_reports_retention() {
        let engine = AggregationEngine::new(2, 3).unwrap();
        for ts in [0.0, 2.0, 4.0, 6.0] {
            engine.record(&TrafficEvent::new(ts, SERVER, "10.0.0.2", 1, "UDP"), SERVER);
        }
        let status = engine.query().status();
        assert_eq!(status.window_size_secs, 2);
        assert_eq!(status.keep_windows, 3);
        assert_eq!(status.windows_held, 3);
        assert_eq!(status.latest_index, Some(3));
    }
}
