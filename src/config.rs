//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `soil.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! structure:
//!     - DeviceConfig: Where the sensor lives and how long we wait for it.
//!     - PollingConfig: How often the poller hits the device.
//!     - HistoryConfig: How many points the live chart keeps.
//!     - ServerConfig: Where the dashboard listens.
//!     - ExportConfig: CSV file name and optional on-exit directory.
//!     - LoggingConfig: Log level and per-reading output.
//!
//! ==============================================================================

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct MonitorConfig {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DeviceConfig {
    pub url: String,
    pub timeout_seconds: u64,
    pub simulate: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HistoryConfig {
    pub max_points: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ExportConfig {
    pub file_name: String,
    /// written on exit when set
    pub directory: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub show_sensor_data: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            url: "http://192.168.4.1/data".to_string(),
            timeout_seconds: 3,
            simulate: false,
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self { interval_seconds: 2 }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { max_points: 50 }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: "0.0.0.0:3000".to_string() }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            file_name: "soil_logs.csv".to_string(),
            directory: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            show_sensor_data: true,
        }
    }
}

impl MonitorConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// Parse and validate a toml document
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: MonitorConfig = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load with default fallback
    ///
    /// runs before logging is set up, so it reports on stdout
    pub fn load_or_default() -> Self {
        let paths = [
            PathBuf::from("config").join("soil.toml"),
            PathBuf::from("..").join("config").join("soil.toml"),
        ];

        for path in &paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => {
                        println!("[CONFIG] Loaded from {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        println!("[CONFIG] Warning: Failed to load {}: {}", path.display(), e);
                    }
                }
            }
        }

        println!("[CONFIG] Warning: No config file found - using defaults");
        Self::default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history.max_points == 0 {
            return Err(ConfigError::Invalid("history.max_points must be at least 1".into()));
        }
        if self.polling.interval_seconds == 0 {
            return Err(ConfigError::Invalid("polling.interval_seconds must be at least 1".into()));
        }
        if self.device.timeout_seconds == 0 {
            return Err(ConfigError::Invalid("device.timeout_seconds must be at least 1".into()));
        }
        if self.export.file_name.trim().is_empty() {
            return Err(ConfigError::Invalid("export.file_name must not be empty".into()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.device.timeout_seconds)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.polling.interval_seconds)
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        let source = if self.device.simulate { "simulated" } else { self.device.url.as_str() };
        println!("┌─────────────────────────────────────────┐");
        println!("│           MONITOR CONFIGURATION         │");
        println!("├─────────────────────────────────────────┤");
        println!("│ Sensor: {}", source);
        println!("│ Timeout: {}s", self.device.timeout_seconds);
        println!("│ Poll Interval: {}s", self.polling.interval_seconds);
        println!("│ Chart Points: {}", self.history.max_points);
        println!("│ Dashboard: http://{}", self.server.bind);
        println!("│ Log Level: {}", self.logging.level);
        println!("└─────────────────────────────────────────┘");
    }
}
