// Library exports for server-traffic-monitor
pub mod aggregation;
pub mod capture;
pub mod config;
pub mod report;
pub mod ui;
pub mod utils;

pub use aggregation::{engine, query, window_store};
pub use capture::{driver, pcap_engine};
pub use config::settings;
pub use report::headless;
pub use ui::app;
pub use utils::formatting;

// Error types
pub use anyhow::{Error, Result};
