//! Error types for the bus.
//!
//! Publishing and subscribing never fail from the caller's point of view; the
//! only errors are raised while building a bus from a configuration.

use thiserror::Error;

/// Bus errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BusError {
    /// Invalid bus configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(&'static str),
}
