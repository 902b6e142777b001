//! Configuration management
//!
//! Values come from a YAML file (`EBOX_CONFIG`, default `ebox.yaml`) with
//! `EBOX__SECTION__KEY` environment variables layered on top. Every section
//! has defaults, so running without a file works.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::registers::{AddressTable, FieldDescriptor};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Wallbox connection
    pub device: DeviceConfig,
    /// Time-series sink
    pub sink: SinkConfig,
    /// Prometheus exporter
    pub metrics: MetricsConfig,
    /// Register table override; the built-in eBox map is used when empty
    pub fields: Vec<FieldDescriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Host name or IP address
    pub host: String,
    /// Modbus TCP port
    pub port: u16,
    /// Modbus unit ID
    pub unit_id: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// Push readings after every poll cycle
    pub enabled: bool,
    /// InfluxDB base URL
    pub url: String,
    /// Database name
    pub database: String,
    /// Measurement the readings are filed under
    pub measurement: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    /// Listen address of the Prometheus scrape endpoint
    pub listen: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5555,
            unit_id: 1,
        }
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: "http://localhost:8086".to_string(),
            database: "ebox".to_string(),
            measurement: "ebox".to_string(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen: "0.0.0.0:9186".to_string(),
        }
    }
}

impl Config {
    /// Register table to poll.
    pub fn address_table(&self) -> AddressTable {
        if self.fields.is_empty() {
            AddressTable::ebox()
        } else {
            AddressTable::new(self.fields.clone())
        }
    }
}

/// Load configuration from file and environment
pub fn load_config() -> Result<Config> {
    let config_path = std::env::var("EBOX_CONFIG").unwrap_or_else(|_| "ebox.yaml".to_string());
    load_config_from_path(&config_path)
}

/// Load configuration from `path` (missing file is fine) plus environment
pub fn load_config_from_path(path: &str) -> Result<Config> {
    if !std::path::Path::new(path).exists() {
        tracing::warn!("Config file {} not found, using defaults", path);
    }

    let settings = config::Config::builder()
        .add_source(
            config::File::new(path, config::FileFormat::Yaml).required(false),
        )
        .add_source(
            config::Environment::with_prefix("EBOX")
                .prefix_separator("__")
                .separator("__"),
        )
        .build()
        .with_context(|| format!("Failed to read config file: {}", path))?;

    settings
        .try_deserialize()
        .with_context(|| "Failed to parse config file")
}

/// Load configuration from a YAML string
pub fn load_config_from_str(yaml: &str) -> Result<Config> {
    serde_yaml::from_str(yaml).with_context(|| "Failed to parse config")
}
