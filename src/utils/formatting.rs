use chrono::{DateTime, Local};

/// Format bytes in human-readable format (B, KB, MB, GB, TB)
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}

/// Average rate of `bytes` spread over a window, in bits per second.
pub fn format_window_rate(bytes: u64, window_size_secs: u64) -> String {
    let bits_per_sec = bytes as f64 * 8.0 / window_size_secs.max(1) as f64;
    const UNITS: &[&str] = &["bps", "Kbps", "Mbps", "Gbps", "Tbps"];
    let mut rate = bits_per_sec;
    let mut unit_index = 0;

    while rate >= 1000.0 && unit_index < UNITS.len() - 1 {
        rate /= 1000.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{:.0} {}", rate, UNITS[unit_index])
    } else {
        format!("{:.2} {}", rate, UNITS[unit_index])
    }
}

/// Format duration in human-readable format
pub fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else if seconds < 86400 {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    } else {
        format!("{}d {}h", seconds / 86400, (seconds % 86400) / 3600)
    }
}

/// Local time-of-day span of a window as `HH:MM:SS-HH:MM:SS`.
pub fn format_window_span(start_ts: i64, end_ts: i64) -> String {
    format!("{}-{}", format_clock(start_ts), format_clock(end_ts))
}

/// Epoch seconds as local `HH:MM:SS`; out-of-range values print raw.
fn format_clock(ts: i64) -> String {
    match DateTime::from_timestamp(ts, 0) {
        Some(utc) => utc.with_timezone(&Local).format("%H:%M:%S").to_string(),
        None => ts.to_string(),
    }
}

/// Truncate string to specified length with ellipsis
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        "...".to_string()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{}...", kept)
    }
}

/// Format IP address for display (handle IPv4/IPv6)
pub fn format_ip_address(addr: &str) -> String {
    let cleaned = addr.trim_start_matches('[').trim_end_matches(']');

    if cleaned.contains(':') && cleaned.len() > 24 {
        truncate_string(cleaned, 24)
    } else {
        cleaned.to_string()
    }
}
