//! Configuration loading.
//!
//! Everything has a default, so running without a config file works. A TOML
//! file overrides any subset of fields:
//!
//! ```toml
//! store_path = "data/wifi_data.json"
//! location_delay_secs = 5
//!
//! [sensors]
//! ping_target = "8.8.8.8"
//! ping_count = 10
//!
//! [server]
//! port = 8050
//!
//! [[locations]]
//! name = "ECC"
//! x = 67.12
//! y = -43.45
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::model::Location;
use crate::session::CollectionConfig;

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// JSON document holding every sample, keyed by location.
    pub store_path: PathBuf,
    /// Optional second copy of the store, same shape.
    pub mirror_path: Option<PathBuf>,
    /// Pause between two locations of a run.
    pub location_delay_secs: u64,
    /// How long a stop request waits for the worker to exit.
    pub stop_timeout_secs: u64,
    pub sensors: SensorConfig,
    pub server: ServerConfig,
    /// Default locations for a run started without an explicit list.
    pub locations: Vec<Location>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("data/wifi_data.json"),
            mirror_path: None,
            location_delay_secs: 5,
            stop_timeout_secs: 30,
            sensors: SensorConfig::default(),
            server: ServerConfig::default(),
            locations: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub ping_target: String,
    pub ping_count: u32,
    pub throughput_timeout_secs: u64,
    pub ping_timeout_secs: u64,
    pub signal_timeout_secs: u64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            ping_target: "8.8.8.8".to_string(),
            ping_count: 10,
            throughput_timeout_secs: 120,
            ping_timeout_secs: 30,
            signal_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8050,
        }
    }
}

impl MonitorConfig {
    /// Load and validate a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&contents).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        debug!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Load `path` if given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sensors.ping_count == 0 {
            return Err(ConfigError::Invalid("sensors.ping_count must be at least 1".into()));
        }
        if self.sensors.ping_target.trim().is_empty() {
            return Err(ConfigError::Invalid("sensors.ping_target is empty".into()));
        }
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server.port must be non-zero".into()));
        }
        if let Some(bad) = self.locations.iter().find(|l| !l.is_valid()) {
            return Err(ConfigError::Invalid(format!("invalid location: {bad}")));
        }
        Ok(())
    }

    /// Session loop settings derived from this config.
    pub fn collection(&self) -> CollectionConfig {
        CollectionConfig {
            location_delay: Duration::from_secs(self.location_delay_secs),
            stop_timeout: Duration::from_secs(self.stop_timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = MonitorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sensors.ping_count, 10);
        assert_eq!(config.sensors.ping_target, "8.8.8.8");
        assert_eq!(config.collection().location_delay, Duration::from_secs(5));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("wifimon.toml");
        std::fs::write(
            &path,
            r#"
store_path = "/var/lib/wifimon/samples.json"

[sensors]
ping_count = 4

[[locations]]
name = "ECC"
x = 67.12
y = -43.45
"#,
        )
        .unwrap();

        let config = MonitorConfig::load(&path).unwrap();
        assert_eq!(config.store_path, PathBuf::from("/var/lib/wifimon/samples.json"));
        assert_eq!(config.sensors.ping_count, 4);
        assert_eq!(config.sensors.ping_target, "8.8.8.8");
        assert_eq!(config.server.port, 8050);
        assert_eq!(config.locations, vec![Location::new("ECC", 67.12, -43.45)]);
    }

    #[test]
    fn zero_ping_count_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("wifimon.toml");
        std::fs::write(&path, "[sensors]\nping_count = 0\n").unwrap();
        assert!(matches!(
            MonitorConfig::load(&path),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn malformed_toml_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("wifimon.toml");
        std::fs::write(&path, "store_path = [").unwrap();
        assert!(matches!(
            MonitorConfig::load(&path),
            Err(ConfigError::Toml { .. })
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = MonitorConfig::load(Path::new("/nonexistent/wifimon.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(MonitorConfig::load_or_default(None).is_ok());
    }
}
