use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, error, info, warn};
use serde::Serialize;

use crate::aggregation::{AggregationEngine, Direction};
use crate::capture::pcap_engine::{CaptureError, CapturedFrame, PcapEngine};

/// Anything that yields captured frames to the producer thread.
pub trait PacketSource: Send + 'static {
    fn next_frame(&mut self) -> Result<CapturedFrame, CaptureError>;
}

impl PacketSource for PcapEngine {
    fn next_frame(&mut self) -> Result<CapturedFrame, CaptureError> {
        PcapEngine::next_frame(self)
    }
}

/// Consecutive read errors tolerated before the producer gives up.
const MAX_CONSECUTIVE_ERRORS: u32 = 50;

#[derive(Debug, Default)]
pub struct CaptureCounters {
    frames: AtomicU64,
    inbound: AtomicU64,
    outbound: AtomicU64,
    ignored: AtomicU64,
    non_ip: AtomicU64,
    errors: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CaptureSnapshot {
    pub frames: u64,
    pub inbound: u64,
    pub outbound: u64,
    pub ignored: u64,
    pub non_ip: u64,
    pub errors: u64,
}

impl CaptureCounters {
    pub fn snapshot(&self) -> CaptureSnapshot {
        CaptureSnapshot {
            frames: self.frames.load(Ordering::Relaxed),
            inbound: self.inbound.load(Ordering::Relaxed),
            outbound: self.outbound.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
            non_ip: self.non_ip.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Handle to the running producer thread.
pub struct CaptureHandle {
    stop: Arc<AtomicBool>,
    counters: Arc<CaptureCounters>,
    thread: Option<JoinHandle<()>>,
}

impl CaptureHandle {
    pub fn counters(&self) -> CaptureSnapshot {
        self.counters.snapshot()
    }

    /// True once the source is exhausted, failed, or the thread was stopped.
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |t| t.is_finished())
    }

    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Capture thread panicked");
            }
        }
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

pub struct CaptureDriver;

impl CaptureDriver {
    /// Starts the single producer thread feeding `engine`.
    pub fn spawn<S: PacketSource>(
        source: S,
        engine: AggregationEngine,
        monitored: String,
    ) -> std::io::Result<CaptureHandle> {
        let stop = Arc::new(AtomicBool::new(false));
        let counters = Arc::new(CaptureCounters::default());

        let thread = {
            let stop = Arc::clone(&stop);
            let counters = Arc::clone(&counters);
            thread::Builder::new()
                .name("capture".to_string())
                .spawn(move || run(source, &engine, &monitored, &stop, &counters))?
        };

        Ok(CaptureHandle {
            stop,
            counters,
            thread: Some(thread),
        })
    }
}

fn run<S: PacketSource>(
    mut source: S,
    engine: &AggregationEngine,
    monitored: &str,
    stop: &AtomicBool,
    counters: &CaptureCounters,
) {
    info!("Capture started, monitoring {}", monitored);
    let mut consecutive_errors = 0;

    while !stop.load(Ordering::Relaxed) {
        match source.next_frame() {
            Ok(CapturedFrame::Event(event)) => {
                consecutive_errors = 0;
                CaptureCounters::bump(&counters.frames);
                match engine.record(&event, monitored) {
                    Some(Direction::Inbound) => CaptureCounters::bump(&counters.inbound),
                    Some(Direction::Outbound) => CaptureCounters::bump(&counters.outbound),
                    None => CaptureCounters::bump(&counters.ignored),
                }
            }
            Ok(CapturedFrame::NonIp) => {
                consecutive_errors = 0;
                CaptureCounters::bump(&counters.frames);
                CaptureCounters::bump(&counters.non_ip);
            }
            Ok(CapturedFrame::Idle) => {}
            Ok(CapturedFrame::Exhausted) => {
                info!("Capture source exhausted");
                break;
            }
            Err(e) => {
                CaptureCounters::bump(&counters.errors);
                consecutive_errors += 1;
                warn!("Error reading frame: {}", e);
                if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                    error!("Giving up after {} consecutive capture errors", consecutive_errors);
                    break;
                }
            }
        }
    }

    debug!("Capture stopped: {:?}", counters.snapshot());
}
