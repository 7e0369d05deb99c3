//! Bus configuration.

use crate::error::BusError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default capacity of the command queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// How long a full conduit may block a delivery before it is evicted, when
/// slow consumers are being dropped.
pub const DELIVERY_TIMEOUT: Duration = Duration::from_secs(1);

/// Bus configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusConfig {
    /// Capacity of the command queue. Callers wait once it is full.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Evict conduits that stay full for `delivery_timeout_ms` instead of
    /// waiting on them indefinitely.
    #[serde(default)]
    pub drop_slow_consumers: bool,

    /// Delivery timeout in milliseconds (drop mode only).
    #[serde(default = "default_delivery_timeout_ms")]
    pub delivery_timeout_ms: u64,
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

fn default_delivery_timeout_ms() -> u64 {
    DELIVERY_TIMEOUT.as_millis() as u64
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            drop_slow_consumers: false,
            delivery_timeout_ms: default_delivery_timeout_ms(),
        }
    }
}

impl BusConfig {
    /// Get the delivery timeout.
    #[must_use]
    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.delivery_timeout_ms)
    }

    /// Check the configuration for values the bus cannot run with.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue capacity or the delivery timeout is zero.
    pub fn validate(&self) -> Result<(), BusError> {
        if self.queue_capacity == 0 {
            return Err(BusError::InvalidConfig("queue capacity must be at least 1"));
        }
        if self.delivery_timeout_ms == 0 {
            return Err(BusError::InvalidConfig("delivery timeout must be non-zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BusConfig::default();
        assert_eq!(config.queue_capacity, 256);
        assert!(!config.drop_slow_consumers);
        assert_eq!(config.delivery_timeout(), Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let config = BusConfig {
            queue_capacity: 0,
            ..BusConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(BusError::InvalidConfig(_))
        ));

        let config = BusConfig {
            delivery_timeout_ms: 0,
            ..BusConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
            drop_slow_consumers = true
            delivery_timeout_ms = 250
        "#;

        let config: BusConfig = toml::from_str(toml_str).unwrap();
        assert!(config.drop_slow_consumers);
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert_eq!(config.delivery_timeout(), Duration::from_millis(250));
    }
}
