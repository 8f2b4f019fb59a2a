//! Headless reporting: one JSON object per line on every tick.
//!
//! Replaces the dashboard when stdout is piped somewhere. Each line carries
//! the retention status, the capture counters and the latest window summary.

use std::io::{self, Write};
use std::time::Duration;

use chrono::Utc;
use log::{info, warn};
use serde::Serialize;
use tokio::time::MissedTickBehavior;

use crate::aggregation::{LatestSummary, QueryFacade, StoreStatus};
use crate::capture::{CaptureHandle, CaptureSnapshot};

#[derive(Debug, Clone, Serialize)]
pub struct ReportLine {
    pub time: i64,
    pub monitored: String,
    pub status: StoreStatus,
    pub capture: Option<CaptureSnapshot>,
    pub latest: LatestSummary,
}

pub fn build_line(query: &QueryFacade, monitored: &str, capture: Option<&CaptureHandle>) -> ReportLine {
    ReportLine {
        time: Utc::now().timestamp(),
        monitored: monitored.to_string(),
        status: query.status(),
        capture: capture.map(CaptureHandle::counters),
        latest: query.latest_summary(),
    }
}

pub fn write_line<W: Write>(out: &mut W, line: &ReportLine) -> io::Result<()> {
    serde_json::to_writer(&mut *out, line)?;
    out.write_all(b"\n")?;
    out.flush()
}

/// Reports every `interval` until Ctrl-C, or until a finite capture (a pcap
/// replay) finishes, in which case the last line covers the whole replay.
pub async fn run<W: Write>(
    query: QueryFacade,
    mut capture: Option<CaptureHandle>,
    monitored: String,
    interval: Duration,
    mut out: W,
) -> io::Result<()> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    info!("Headless reporting every {:?}", interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let finished = capture.as_ref().map_or(false, CaptureHandle::is_finished);
                write_line(&mut out, &build_line(&query, &monitored, capture.as_ref()))?;
                if finished {
                    info!("Capture finished, final report written");
                    break;
                }
            }
            signal = &mut ctrl_c => {
                if let Err(e) = signal {
                    warn!("Cannot listen for Ctrl-C: {}", e);
                }
                write_line(&mut out, &build_line(&query, &monitored, capture.as_ref()))?;
                info!("Interrupted, stopping");
                break;
            }
        }
    }

    if let Some(mut handle) = capture.take() {
        handle.stop();
    }
    Ok(())
}
