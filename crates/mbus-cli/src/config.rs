//! Soak runner configuration.
//!
//! Configuration can be loaded from:
//! - The file named by `MBUS_CONFIG`
//! - `mbus.toml`, `/etc/mbus/mbus.toml` or `~/.config/mbus/mbus.toml`
//! - Environment variables (MBUS_*) on top of built-in defaults

use anyhow::{bail, Context, Result};
use mbus_core::BusConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Runner configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Bus settings.
    #[serde(default)]
    pub bus: BusConfig,

    /// Load shape.
    #[serde(default)]
    pub soak: SoakConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Load shape for a soak run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoakConfig {
    /// Number of publishing tasks.
    #[serde(default = "default_producers")]
    pub producers: usize,

    /// Number of subscribing tasks.
    #[serde(default = "default_consumers")]
    pub consumers: usize,

    /// How many of the consumers never drain their conduit.
    #[serde(default)]
    pub slow_consumers: usize,

    /// Buffer size of each consumer's conduit.
    #[serde(default = "default_conduit_capacity")]
    pub conduit_capacity: usize,

    /// Topics to publish on; every consumer subscribes to all of them.
    #[serde(default = "default_topics")]
    pub topics: Vec<String>,

    /// Payload size in bytes.
    #[serde(default = "default_payload_size")]
    pub payload_size: usize,

    /// Pause between publishes of one producer, in milliseconds.
    #[serde(default = "default_publish_interval")]
    pub publish_interval_ms: u64,

    /// Run time in seconds; 0 runs until Ctrl-C.
    #[serde(default = "default_run_secs")]
    pub run_secs: u64,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable the Prometheus exporter.
    #[serde(default)]
    pub enabled: bool,

    /// Exporter port.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// Default value functions
fn default_producers() -> usize {
    4
}

fn default_consumers() -> usize {
    8
}

fn default_conduit_capacity() -> usize {
    64
}

fn default_topics() -> Vec<String> {
    vec!["orders".to_string(), "trades".to_string(), "quotes".to_string()]
}

fn default_payload_size() -> usize {
    64
}

fn default_publish_interval() -> u64 {
    1
}

fn default_run_secs() -> u64 {
    std::env::var("MBUS_RUN_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(10)
}

fn default_metrics_port() -> u16 {
    std::env::var("MBUS_METRICS_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(9090)
}

impl Default for Config {
    fn default() -> Self {
        let mut bus = BusConfig::default();
        if let Some(enabled) = std::env::var("MBUS_DROP_SLOW_CONSUMERS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            bus.drop_slow_consumers = enabled;
        }
        Self {
            bus,
            soak: SoakConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for SoakConfig {
    fn default() -> Self {
        Self {
            producers: default_producers(),
            consumers: default_consumers(),
            slow_consumers: 0,
            conduit_capacity: default_conduit_capacity(),
            topics: default_topics(),
            payload_size: default_payload_size(),
            publish_interval_ms: default_publish_interval(),
            run_secs: default_run_secs(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

impl Config {
    /// Load configuration from file or defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self> {
        if let Ok(path) = std::env::var("MBUS_CONFIG") {
            return Self::from_file(shellexpand::tilde(&path).as_ref());
        }

        let config_paths = [
            "mbus.toml",
            "/etc/mbus/mbus.toml",
            "~/.config/mbus/mbus.toml",
        ];

        for path in &config_paths {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                return Self::from_file(expanded.as_ref());
            }
        }

        // Fall back to defaults with environment overrides
        let config = Self::default();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        Ok(config)
    }

    /// Check the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        self.bus.validate()?;
        if self.soak.topics.iter().any(String::is_empty) {
            bail!("soak.topics must not contain empty names");
        }
        if self.soak.topics.is_empty() {
            bail!("soak.topics must name at least one topic");
        }
        if self.soak.conduit_capacity == 0 {
            bail!("soak.conduit_capacity must be at least 1");
        }
        if self.soak.slow_consumers > self.soak.consumers {
            bail!("soak.slow_consumers cannot exceed soak.consumers");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.soak.producers, 4);
        assert_eq!(config.soak.topics.len(), 3);
        assert!(!config.metrics.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
            [bus]
            drop_slow_consumers = true
            queue_capacity = 32

            [soak]
            consumers = 2
            slow_consumers = 1
            topics = ["alpha"]
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert!(config.bus.drop_slow_consumers);
        assert_eq!(config.bus.queue_capacity, 32);
        assert_eq!(config.bus.delivery_timeout_ms, 1000);
        assert_eq!(config.soak.consumers, 2);
        assert_eq!(config.soak.topics, ["alpha"]);
        assert_eq!(config.soak.conduit_capacity, 64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.soak.slow_consumers = config.soak.consumers + 1;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.soak.topics.push(String::new());
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.bus.queue_capacity = 0;
        assert!(config.validate().is_err());
    }
}
