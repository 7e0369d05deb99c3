//! Soak run: producers, consumers and a lifecycle observer sharing one bus.

use crate::config::{Config, SoakConfig};
use anyhow::Result;
use bytes::Bytes;
use mbus_core::{sub_topic, unsub_topic, Bus, Conduit, TracingWarner, Warner};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

/// Data carried by soak messages.
#[derive(Debug, Clone)]
pub struct Tick {
    /// Bus-unique identifier.
    pub id: String,
    /// Payload bytes, shared between ticks.
    pub body: Bytes,
}

/// Totals collected over a soak run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Report {
    /// Messages handed to the bus.
    pub published: u64,
    /// Messages received by draining consumers.
    pub received: u64,
    /// `sub_` notifications seen by the observer.
    pub subscribed: u64,
    /// `unsub_` notifications seen by the observer (evictions included).
    pub unsubscribed: u64,
}

/// Run a soak until `token` is cancelled.
///
/// # Errors
///
/// Returns an error if the bus configuration is invalid.
pub async fn run(config: &Config, token: CancellationToken) -> Result<Report> {
    let warner: Arc<dyn Warner> = Arc::new(TracingWarner);
    let bus = Bus::with_config(config.bus.clone(), token.clone(), Some(warner))?;
    let soak = &config.soak;

    info!(
        producers = soak.producers,
        consumers = soak.consumers,
        slow_consumers = soak.slow_consumers,
        topics = ?soak.topics,
        drop_slow_consumers = bus.drop_slow_consumers(),
        "Starting soak"
    );

    let observer = spawn_observer(&bus, soak, token.clone()).await;

    let consumers: Vec<JoinHandle<u64>> = {
        let mut handles = Vec::with_capacity(soak.consumers);
        for i in 0..soak.consumers {
            let slow = i < soak.slow_consumers;
            handles.push(spawn_consumer(&bus, soak, slow, token.clone()).await);
        }
        handles
    };

    let producers: Vec<JoinHandle<u64>> = (0..soak.producers)
        .map(|_| spawn_producer(&bus, soak, token.clone()))
        .collect();

    let mut report = Report::default();
    for handle in producers {
        report.published += handle.await?;
    }
    for handle in consumers {
        report.received += handle.await?;
    }
    let (subscribed, unsubscribed) = observer.await?;
    report.subscribed = subscribed;
    report.unsubscribed = unsubscribed;

    bus.stopped().await;
    Ok(report)
}

async fn spawn_observer(
    bus: &Bus,
    soak: &SoakConfig,
    token: CancellationToken,
) -> JoinHandle<(u64, u64)> {
    let (conduit, mut rx) = Conduit::channel(soak.conduit_capacity.max(soak.consumers * 2));
    let meta: Vec<String> = soak
        .topics
        .iter()
        .flat_map(|t| [sub_topic(t), unsub_topic(t)])
        .collect();
    bus.subscribe(&conduit, meta).await;

    tokio::spawn(async move {
        let (mut subscribed, mut unsubscribed) = (0, 0);
        loop {
            let msg = tokio::select! {
                _ = token.cancelled() => break,
                msg = rx.recv() => match msg {
                    Some(msg) => msg,
                    None => break,
                },
            };
            let Some(subject) = msg.conduit() else {
                continue;
            };
            if msg.topic().starts_with(mbus_core::SUB_TOPIC_PREFIX) {
                subscribed += 1;
            } else {
                unsubscribed += 1;
                info!(conduit = %subject, topic = %msg.topic(), "Subscription removed");
            }
            debug!(conduit = %subject, topic = %msg.topic(), "Lifecycle event");
        }
        drop(conduit);
        (subscribed, unsubscribed)
    })
}

async fn spawn_consumer(
    bus: &Bus,
    soak: &SoakConfig,
    slow: bool,
    token: CancellationToken,
) -> JoinHandle<u64> {
    let (conduit, mut rx) = Conduit::channel(soak.conduit_capacity);
    bus.subscribe(&conduit, soak.topics.iter().cloned()).await;

    if slow {
        debug!(conduit = %conduit, "Slow consumer subscribed");
        return tokio::spawn(async move {
            token.cancelled().await;
            drop((conduit, rx));
            0
        });
    }

    tokio::spawn(async move {
        let mut received = 0;
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                msg = rx.recv() => match msg {
                    Some(msg) => {
                        if let Some(tick) = msg.data::<Tick>() {
                            trace!(id = %tick.id, bytes = tick.body.len(), "Received tick");
                        }
                        received += 1;
                    }
                    None => break,
                },
            }
        }
        debug!(conduit = %conduit, received, "Consumer finished");
        received
    })
}

fn spawn_producer(bus: &Bus, soak: &SoakConfig, token: CancellationToken) -> JoinHandle<u64> {
    let bus = bus.clone();
    let topics = soak.topics.clone();
    let body = Bytes::from(vec![0u8; soak.payload_size]);
    let period = Duration::from_millis(soak.publish_interval_ms.max(1));

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        let mut published = 0;
        for topic in topics.iter().cycle() {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = interval.tick() => {}
            }
            let tick = Tick {
                id: bus.next_id(),
                body: body.clone(),
            };
            bus.publish(topic.as_str(), tick).await;
            // A publish racing cancellation may have been dropped.
            if token.is_cancelled() {
                break;
            }
            published += 1;
        }
        published
    })
}
