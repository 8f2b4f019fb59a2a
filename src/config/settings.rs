use serde::{Deserialize, Serialize};
use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot access config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Cannot serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub aggregation: AggregationConfig,
    pub capture: CaptureConfig,
    pub ui: UiConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AggregationConfig {
    pub window_size_secs: u64,
    pub keep_windows: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Address whose inbound and outbound traffic is tracked.
    pub server_ip: String,
    pub interface: Option<String>,
    /// Replay this file instead of capturing live.
    pub pcap_file: Option<PathBuf>,
    pub snaplen: i32,
    pub timeout_ms: i32,
    pub promiscuous: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct UiConfig {
    pub refresh_rate_ms: u64,
    pub default_view: String,
    pub max_rows: usize,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            window_size_secs: 5,
            keep_windows: 60, // 5 minutes at 5s windows
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            server_ip: "192.168.0.10".to_string(),
            interface: None,
            pcap_file: None,
            snaplen: 65535,
            timeout_ms: 1000,
            promiscuous: false,
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            refresh_rate_ms: 1000,
            default_view: "peers".to_string(),
            max_rows: 50,
        }
    }
}

impl Config {
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Checks ranges and rewrites `server_ip` into the canonical text form the
    /// capture layer produces, so address comparison is exact.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.aggregation.window_size_secs == 0 {
            return Err(ConfigError::Invalid("window_size_secs must be positive".to_string()));
        }
        if self.aggregation.keep_windows == 0 {
            return Err(ConfigError::Invalid("keep_windows must be positive".to_string()));
        }
        if self.capture.snaplen <= 0 {
            return Err(ConfigError::Invalid("snaplen must be positive".to_string()));
        }
        // A zero read timeout lets libpcap block forever, so capture could never stop.
        if self.capture.timeout_ms <= 0 {
            return Err(ConfigError::Invalid("timeout_ms must be positive".to_string()));
        }
        if self.ui.refresh_rate_ms == 0 {
            return Err(ConfigError::Invalid("refresh_rate_ms must be positive".to_string()));
        }

        let server_ip: IpAddr = self.capture.server_ip.trim().parse().map_err(|_| {
            ConfigError::Invalid(format!("server_ip '{}' is not an IP address", self.capture.server_ip))
        })?;
        self.capture.server_ip = server_ip.to_string();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_service_defaults() {
        let config = Config::default();
        assert_eq!(config.aggregation.window_size_secs, 5);
        assert_eq!(config.aggregation.keep_windows, 60);
        assert_eq!(config.capture.server_ip, "192.168.0.10");
        assert!(config.capture.pcap_file.is_none());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [aggregation]
            window_size_secs = 10

            [capture]
            server_ip = "10.0.0.5"
            pcap_file = "/tmp/trace.pcap"
            "#,
        )
        .unwrap();

        assert_eq!(config.aggregation.window_size_secs, 10);
        assert_eq!(config.aggregation.keep_windows, 60);
        assert_eq!(config.capture.server_ip, "10.0.0.5");
        assert_eq!(config.capture.pcap_file, Some(PathBuf::from("/tmp/trace.pcap")));
        assert_eq!(config.ui, UiConfig::default());
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitor.toml");

        let mut config = Config::default();
        config.capture.interface = Some("eth0".to_string());
        config.aggregation.keep_windows = 12;
        config.save_to_file(&path).unwrap();

        assert_eq!(Config::load_from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load_from_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let mut config = Config::default();
        config.aggregation.window_size_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.aggregation.keep_windows = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.capture.timeout_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.capture.snaplen = -1;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_blocking_timeout_from_file() {
        let mut config: Config = toml::from_str(
            r#"
            [capture]
            timeout_ms = 0
            "#,
        )
        .unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("timeout_ms"));
    }

    #[test]
    fn test_validate_canonicalizes_server_ip() {
        let mut config = Config::default();
        config.capture.server_ip = " 2001:0db8:0000::0001 ".to_string();
        config.validate().unwrap();
        assert_eq!(config.capture.server_ip, "2001:db8::1");

        config.capture.server_ip = "not-an-ip".to_string();
        assert!(config.validate().is_err());
    }
}
