//! # mbus-core
//!
//! In-process publish/subscribe message bus.
//!
//! This crate provides the fundamental building blocks:
//!
//! - **Bus** - Cloneable handle producers and consumers talk to
//! - **Dispatcher** - Single task that owns the topic registry and fans messages out
//! - **Conduit** - Caller-owned, bounded delivery handle
//! - **Message** - Topic plus shared, opaque data
//! - **Warner** - Optional sink for slow-consumer diagnostics
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐  commands  ┌──────────────┐     ┌─────────────┐
//! │     Bus     │───────────▶│  Dispatcher  │────▶│   Conduit   │
//! └─────────────┘  (bounded) └──────────────┘     └─────────────┘
//!                                   │
//!                                   ▼
//!                            ┌──────────────┐
//!                            │   Registry   │
//!                            └──────────────┘
//! ```
//!
//! Every publish, subscribe and unsubscribe is a command on one bounded queue.
//! The dispatcher handles them one at a time, so registry mutations happen in
//! queue arrival order and the registry itself is never shared.
//!
//! ## Example
//!
//! ```no_run
//! use mbus_core::{Bus, Conduit};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() {
//! let bus = Bus::new(CancellationToken::new(), None);
//! let (conduit, mut rx) = Conduit::channel(16);
//!
//! bus.subscribe(&conduit, ["orders"]).await;
//! bus.publish("orders", 42_u64).await;
//!
//! let msg = rx.recv().await.unwrap();
//! assert_eq!(msg.data::<u64>(), Some(&42));
//! # }
//! ```

pub mod bus;
pub mod conduit;
pub mod config;
mod dispatcher;
pub mod error;
pub mod id;
pub mod message;
pub mod metrics;
pub mod registry;
pub mod warner;

pub use bus::Bus;
pub use conduit::{Conduit, ConduitId, MessageReceiver};
pub use config::{BusConfig, DEFAULT_QUEUE_CAPACITY, DELIVERY_TIMEOUT};
pub use error::BusError;
pub use id::IdGenerator;
pub use message::{sub_topic, unsub_topic, Data, Message, SUB_TOPIC_PREFIX, UNSUB_TOPIC_PREFIX};
pub use registry::Registry;
pub use warner::{TracingWarner, Warner};
