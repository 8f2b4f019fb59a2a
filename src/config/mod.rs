pub mod settings;

pub use settings::{AggregationConfig, CaptureConfig, Config, ConfigError, UiConfig};
