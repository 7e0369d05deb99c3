//! The dispatcher: the single task that owns the topic registry.
//!
//! Every mutation of the registry and every fan-out happens here, one command
//! at a time, in the order commands arrived on the queue. Nothing else can reach
//! the registry, so it needs no locking.
//!
//! Fan-out runs inline on the dispatcher's turn. With slow consumers kept
//! (the default), delivery waits on a full conduit until it has room or the bus
//! is cancelled, holding up the rest of the fan-out and the next command. With
//! slow consumers dropped, a full conduit gets one bounded wait; if it is still
//! full afterwards it is evicted from the topic.
//!
//! Eviction calls [`Dispatcher::deactivate`] directly, on the same turn,
//! instead of queueing an unsubscribe: the queue may be full, and the only task
//! that drains it is this one.

use crate::conduit::Conduit;
use crate::message::{sub_topic, unsub_topic, Message};
use crate::metrics;
use crate::registry::Registry;
use crate::warner::Warner;
use futures_util::future::{BoxFuture, FutureExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

/// A request travelling through the command queue.
pub(crate) enum Command {
    /// Fan a message out to its topic's subscribers.
    Publish(Arc<Message>),
    /// Add or remove a conduit's subscriptions.
    Subscription(Subscription),
}

/// A batch of topics to subscribe a conduit to, or unsubscribe it from.
pub(crate) struct Subscription {
    pub(crate) topics: Vec<String>,
    pub(crate) conduit: Conduit,
    pub(crate) active: bool,
}

/// Outcome of one delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Delivered,
    Cancelled,
    /// Still full after the bounded wait.
    Stalled,
    /// The consumer dropped its receiver.
    Closed,
}

pub(crate) struct Dispatcher {
    commands: mpsc::Receiver<Command>,
    registry: Registry,
    token: CancellationToken,
    drop_slow_consumers: Arc<AtomicBool>,
    delivery_timeout: Duration,
    warner: Option<Arc<dyn Warner>>,
}

impl Dispatcher {
    pub(crate) fn new(
        commands: mpsc::Receiver<Command>,
        token: CancellationToken,
        drop_slow_consumers: Arc<AtomicBool>,
        delivery_timeout: Duration,
        warner: Option<Arc<dyn Warner>>,
    ) -> Self {
        Self {
            commands,
            registry: Registry::new(),
            token,
            drop_slow_consumers,
            delivery_timeout,
            warner,
        }
    }

    /// Drain the command queue until cancelled or every bus handle is gone.
    ///
    /// The registry is always cleared on the way out.
    pub(crate) async fn run(&mut self) {
        info!("Dispatcher started");

        loop {
            let command = tokio::select! {
                biased;
                _ = self.token.cancelled() => break,
                command = self.commands.recv() => match command {
                    Some(command) => command,
                    None => break,
                },
            };

            match command {
                Command::Publish(message) => self.publish(message).await,
                Command::Subscription(sub) if sub.active => {
                    self.activate(&sub.conduit, &sub.topics).await;
                }
                Command::Subscription(sub) => {
                    self.deactivate(&sub.conduit, &sub.topics).await;
                }
            }
        }

        self.registry.clear();
        metrics::set_active_topics(0);
        info!("Dispatcher stopped");
    }

    #[cfg(test)]
    pub(crate) fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Deliver `message` to every conduit subscribed to its topic.
    async fn publish(&mut self, message: Arc<Message>) {
        let Some(conduits) = self.registry.lookup(&message.topic) else {
            return;
        };
        let conduits: Vec<Conduit> = conduits.iter().cloned().collect();

        metrics::record_publish();
        trace!(topic = %message.topic, recipients = conduits.len(), "Publishing message");

        for conduit in conduits {
            if self.token.is_cancelled() {
                metrics::record_abandoned();
                trace!(topic = %message.topic, "Fan-out abandoned");
                return;
            }
            // Evicted earlier in this pass.
            if !self.registry.contains(&message.topic, &conduit) {
                continue;
            }

            let outcome = if self.drop_slow_consumers.load(Ordering::Relaxed) {
                self.deliver_or_timeout(&conduit, &message).await
            } else {
                self.deliver(&conduit, &message).await
            };

            match outcome {
                Delivery::Delivered => metrics::record_delivery(),
                Delivery::Cancelled => {
                    metrics::record_abandoned();
                    trace!(topic = %message.topic, "Fan-out abandoned");
                    return;
                }
                Delivery::Stalled | Delivery::Closed => {
                    self.evict(&conduit, &message.topic, outcome).await;
                }
            }
        }
    }

    /// Wait for room in the conduit, or cancellation.
    async fn deliver(&self, conduit: &Conduit, message: &Arc<Message>) -> Delivery {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Delivery::Cancelled,
            res = conduit.sender().send(message.clone()) => match res {
                Ok(()) => Delivery::Delivered,
                Err(_) => Delivery::Closed,
            },
        }
    }

    /// Try an immediate delivery, then wait at most `delivery_timeout`.
    async fn deliver_or_timeout(&self, conduit: &Conduit, message: &Arc<Message>) -> Delivery {
        match conduit.sender().try_send(message.clone()) {
            Ok(()) => return Delivery::Delivered,
            Err(TrySendError::Closed(_)) => return Delivery::Closed,
            Err(TrySendError::Full(_)) => {}
        }

        trace!(conduit = %conduit, topic = %message.topic, "Conduit full, waiting");

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Delivery::Cancelled,
            res = tokio::time::timeout(self.delivery_timeout, conduit.sender().send(message.clone())) => {
                match res {
                    Ok(Ok(())) => Delivery::Delivered,
                    Ok(Err(_)) => Delivery::Closed,
                    Err(_) => Delivery::Stalled,
                }
            }
        }
    }

    /// Drop an unresponsive conduit from `topic`.
    ///
    /// Only called when slow consumers are being dropped, or when the conduit's
    /// receiver is gone.
    async fn evict(&mut self, conduit: &Conduit, topic: &str, outcome: Delivery) {
        match outcome {
            Delivery::Stalled => {
                if !self.registry.contains(topic, conduit) {
                    debug!(conduit = %conduit, topic = %topic, "Stalled conduit already unsubscribed");
                    return;
                }
                if let Some(warner) = &self.warner {
                    warner.warning(&[
                        &"cannot deliver, increase conduit capacity:",
                        &conduit.len(),
                        &conduit.max_capacity(),
                        &conduit.id(),
                        &topic,
                    ]);
                }
                metrics::record_eviction("stalled");
            }
            Delivery::Closed => {
                if !self.drop_slow_consumers.load(Ordering::Relaxed)
                    || !self.registry.contains(topic, conduit)
                {
                    trace!(conduit = %conduit, topic = %topic, "Skipping closed conduit");
                    return;
                }
                if let Some(warner) = &self.warner {
                    warner.warning(&[
                        &"cannot deliver, conduit receiver dropped:",
                        &conduit.id(),
                        &topic,
                    ]);
                }
                metrics::record_eviction("closed");
            }
            Delivery::Delivered | Delivery::Cancelled => return,
        }

        debug!(conduit = %conduit, topic = %topic, "Evicting conduit");
        let topics = [topic.to_string()];
        self.deactivate(conduit, &topics).await;
    }

    /// Subscribe `conduit` to each topic, announcing each on its `sub_` topic.
    ///
    /// Stops at the first topic reached after cancellation; topics already
    /// handled stay subscribed.
    async fn activate(&mut self, conduit: &Conduit, topics: &[String]) {
        for topic in topics {
            if self.token.is_cancelled() {
                return;
            }
            if self.registry.add(topic, conduit) {
                metrics::record_subscription();
                metrics::set_active_topics(self.registry.topic_count());
                debug!(
                    topic = %topic,
                    conduit = %conduit,
                    subscribers = self.registry.subscriber_count(topic),
                    "Subscribed"
                );
            }
            let notice = Message::new(sub_topic(topic), conduit.clone());
            self.publish(Arc::new(notice)).await;
        }
    }

    /// Unsubscribe `conduit` from each topic, announcing each on its `unsub_`
    /// topic.
    ///
    /// Boxed because eviction makes publish and deactivate mutually recursive.
    fn deactivate<'a>(&'a mut self, conduit: &'a Conduit, topics: &'a [String]) -> BoxFuture<'a, ()> {
        async move {
            for topic in topics {
                if self.token.is_cancelled() {
                    return;
                }
                if self.registry.remove(topic, conduit) {
                    metrics::record_unsubscription();
                    metrics::set_active_topics(self.registry.topic_count());
                    debug!(
                        topic = %topic,
                        conduit = %conduit,
                        subscribers = self.registry.subscriber_count(topic),
                        "Unsubscribed"
                    );
                }
                let notice = Message::new(unsub_topic(topic), conduit.clone());
                self.publish(Arc::new(notice)).await;
            }
        }
        .boxed()
    }
}
