//! Slow-consumer warning sink.

use std::fmt;
use tracing::warn;

/// Receives diagnostics when the bus evicts an unresponsive conduit.
///
/// The bus passes a short list of values (a description, the conduit's queued
/// length and capacity, its identity, and the topic). A bus built without a
/// warner simply skips the call.
pub trait Warner: Send + Sync {
    /// Accept a list of loggable values.
    fn warning(&self, values: &[&dyn fmt::Debug]);
}

impl<F> Warner for F
where
    F: Fn(&[&dyn fmt::Debug]) + Send + Sync,
{
    fn warning(&self, values: &[&dyn fmt::Debug]) {
        self(values);
    }
}

/// Warner that forwards to `tracing` at `WARN` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingWarner;

impl Warner for TracingWarner {
    fn warning(&self, values: &[&dyn fmt::Debug]) {
        warn!("{}", join_values(values));
    }
}

/// Render values space-separated, strings unquoted.
pub(crate) fn join_values(values: &[&dyn fmt::Debug]) -> String {
    values
        .iter()
        .map(|v| {
            let s = format!("{v:?}");
            match s.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
                Some(inner) => inner.to_string(),
                None => s,
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
