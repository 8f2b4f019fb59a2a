pub mod formatting;

pub use formatting::{format_bytes, format_duration, format_ip_address, format_window_rate, format_window_span, truncate_string};
