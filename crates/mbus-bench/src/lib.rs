//! Shared setup for the mbus benchmarks.

use mbus_core::{Bus, BusConfig, Conduit, MessageReceiver};
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

/// Build the multi-threaded runtime the benchmarks drive the bus on.
///
/// # Panics
///
/// Panics if the runtime cannot be created.
#[must_use]
pub fn runtime() -> Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
}

/// A bus with `subscribers` conduits subscribed to `topic`.
pub struct Fixture {
    pub bus: Bus,
    pub conduits: Vec<Conduit>,
    pub receivers: Vec<MessageReceiver>,
    token: CancellationToken,
}

impl Fixture {
    /// Start a bus and subscribe `subscribers` conduits of `capacity` to `topic`.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub async fn new(topic: &str, subscribers: usize, capacity: usize) -> Self {
        let token = CancellationToken::new();
        let bus = Bus::with_config(BusConfig::default(), token.clone(), None)
            .expect("default config is valid");

        let mut conduits = Vec::with_capacity(subscribers);
        let mut receivers = Vec::with_capacity(subscribers);
        for _ in 0..subscribers {
            let (conduit, rx) = Conduit::channel(capacity);
            bus.subscribe(&conduit, [topic]).await;
            conduits.push(conduit);
            receivers.push(rx);
        }

        Self {
            bus,
            conduits,
            receivers,
            token,
        }
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
