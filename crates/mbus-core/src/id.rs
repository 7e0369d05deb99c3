//! Unique identifier generation.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counter handing out unique string identifiers.
///
/// Safe to share between any number of threads; it never blocks and never
/// fails. The first identifier is `"1"`.
#[derive(Debug, Default)]
pub struct IdGenerator {
    counter: AtomicU64,
}

impl IdGenerator {
    /// Create a new generator starting at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the next identifier as a base-10 string.
    #[must_use]
    pub fn next(&self) -> String {
        (self.counter.fetch_add(1, Ordering::Relaxed) + 1).to_string()
    }
}
