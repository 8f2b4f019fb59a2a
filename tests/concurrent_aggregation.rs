use server_traffic_monitor::aggregation::{AggregationEngine, TrafficEvent};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

const SERVER: &str = "192.168.0.10";

#[test]
fn concurrent_writers_lose_no_updates() {
    let engine = AggregationEngine::new(60, 4).unwrap();
    let writers: Vec<_> = (0..8)
        .map(|worker| {
            let engine = engine.clone();
            thread::spawn(move || {
                let peer = format!("10.1.0.{}", worker % 4);
                for i in 0..1000 {
                    let event = if i % 2 == 0 {
                        TrafficEvent::new(30.0, peer.as_str(), SERVER, 3, "TCP")
                    } else {
                        TrafficEvent::new(30.0, SERVER, peer.as_str(), 5, "UDP")
                    };
                    engine.record(&event, SERVER);
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    let window = engine.query().window_at(0).unwrap();
    assert_eq!(window.peers.len(), 4);
    assert_eq!(window.total_bytes, 8 * (500 * 3 + 500 * 5));
    for peer in &window.peers {
        // two writers per peer address
        assert_eq!(peer.inbound_bytes, 2 * 500 * 3);
        assert_eq!(peer.outbound_bytes, 2 * 500 * 5);
        assert_eq!(peer.protocols["TCP"], peer.inbound_bytes);
        assert_eq!(peer.protocols["UDP"], peer.outbound_bytes);
    }
}

#[test]
fn readers_never_observe_partial_updates() {
    let engine = AggregationEngine::new(1, 3).unwrap();
    let done = Arc::new(AtomicBool::new(false));
    let started = Arc::new(AtomicUsize::new(0));
    let overlapping_reads = Arc::new(AtomicUsize::new(0));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let query = engine.query();
            let done = Arc::clone(&done);
            let started = Arc::clone(&started);
            let overlapping_reads = Arc::clone(&overlapping_reads);
            thread::spawn(move || {
                started.fetch_add(1, Ordering::SeqCst);
                while !done.load(Ordering::SeqCst) {
                    let summary = query.latest_summary();
                    let peer_sum: u64 = summary.peers.iter().map(|p| p.total_bytes).sum();
                    assert_eq!(summary.total_bytes, peer_sum);
                    for peer in &summary.peers {
                        assert_eq!(peer.total_bytes, peer.inbound_bytes + peer.outbound_bytes);
                    }
                    assert!(query.status().windows_held <= 3);
                    if !done.load(Ordering::SeqCst) {
                        overlapping_reads.fetch_add(1, Ordering::SeqCst);
                    }
                }
            })
        })
        .collect();

    while started.load(Ordering::SeqCst) < 4 {
        thread::yield_now();
    }
    for i in 0..20_000u64 {
        let ts = (i / 500) as f64;
        let peer = format!("10.2.0.{}", i % 7);
        engine.record(&TrafficEvent::new(ts, peer.as_str(), SERVER, i % 1500, "TCP"), SERVER);
    }
    // keep writing until at least one read has finished while writes were still coming
    let mut extra = 0u64;
    while overlapping_reads.load(Ordering::SeqCst) == 0 {
        let ts = 39.0 + (extra % 2) as f64 * 0.5;
        engine.record(&TrafficEvent::new(ts, "10.2.0.1", SERVER, 1, "TCP"), SERVER);
        extra += 1;
        thread::yield_now();
    }
    done.store(true, Ordering::SeqCst);

    for reader in readers {
        reader.join().unwrap();
    }
    assert!(overlapping_reads.load(Ordering::SeqCst) > 0);

    let status = engine.query().status();
    assert_eq!(status.windows_held, 3);
    assert_eq!(status.latest_index, Some(39));
}

#[test]
fn eviction_follows_insertion_order() {
    let engine = AggregationEngine::new(10, 3).unwrap();
    // inserted out of chronological order: 50, 10, 30, then 20 forces one eviction
    for ts in [505.0, 105.0, 305.0, 205.0] {
        engine.record(&TrafficEvent::new(ts, "10.3.0.1", SERVER, 1, "ICMP"), SERVER);
    }

    let query = engine.query();
    assert!(query.window_at(500).is_none());
    for start in [100, 300, 200] {
        assert!(query.window_at(start).is_some(), "window at {} was evicted", start);
    }
    let held: Vec<i64> = query.windows().iter().map(|w| w.index).collect();
    assert_eq!(held, vec![10, 30, 20]);
}
