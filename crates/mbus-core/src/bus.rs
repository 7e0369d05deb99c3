//! The public bus handle.
//!
//! A [`Bus`] is a cheap, cloneable front for one dispatcher task. All of its
//! mutating calls are fire-and-forget: they put a command on the bounded queue
//! and return once it is queued, not once it has taken effect.
//!
//! When the queue is full, callers wait for room. That wait has no upper bound
//! other than cancellation: once the bus's token is cancelled, a waiting call
//! returns without queueing anything.

use crate::conduit::Conduit;
use crate::config::BusConfig;
use crate::dispatcher::{Command, Dispatcher, Subscription};
use crate::error::BusError;
use crate::id::IdGenerator;
use crate::message::{Data, Message};
use crate::warner::Warner;
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Handle to a running message bus.
#[derive(Clone)]
pub struct Bus {
    commands: mpsc::Sender<Command>,
    token: CancellationToken,
    stopped: CancellationToken,
    ids: Arc<IdGenerator>,
    drop_slow_consumers: Arc<AtomicBool>,
}

impl Bus {
    /// Create a bus with default configuration and start its dispatcher.
    ///
    /// The bus runs until `token` is cancelled or every handle is dropped.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn new(token: CancellationToken, warner: Option<Arc<dyn Warner>>) -> Self {
        Self::spawn(BusConfig::default(), token, warner)
    }

    /// Create a bus with custom configuration and start its dispatcher.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn with_config(
        config: BusConfig,
        token: CancellationToken,
        warner: Option<Arc<dyn Warner>>,
    ) -> Result<Self, BusError> {
        config.validate()?;
        Ok(Self::spawn(config, token, warner))
    }

    fn spawn(config: BusConfig, token: CancellationToken, warner: Option<Arc<dyn Warner>>) -> Self {
        debug!("Creating bus with config: {:?}", config);

        let (commands, receiver) = mpsc::channel(config.queue_capacity);
        let drop_slow_consumers = Arc::new(AtomicBool::new(config.drop_slow_consumers));
        let stopped = CancellationToken::new();

        let mut dispatcher = Dispatcher::new(
            receiver,
            token.clone(),
            drop_slow_consumers.clone(),
            config.delivery_timeout(),
            warner,
        );
        let guard = stopped.clone().drop_guard();
        tokio::spawn(async move {
            let _guard = guard;
            dispatcher.run().await;
        });

        Self {
            commands,
            token,
            stopped,
            ids: Arc::new(IdGenerator::new()),
            drop_slow_consumers,
        }
    }

    /// Publish `data` on `topic`.
    ///
    /// Empty topics are ignored. The data is moved behind one shared reference
    /// that every subscriber receives.
    pub async fn publish<T>(&self, topic: impl Into<String>, data: T)
    where
        T: Any + Send + Sync,
    {
        let topic = topic.into();
        if topic.is_empty() {
            return;
        }
        self.enqueue(Command::Publish(Arc::new(Message::new(topic, data))))
            .await;
    }

    /// Publish an existing shared data reference on `topic`.
    ///
    /// Subscribers receive the very same reference.
    pub async fn publish_shared(&self, topic: impl Into<String>, data: Data) {
        self.publish_message(Message::from_shared(topic, data)).await;
    }

    /// Publish a prebuilt message. Messages with an empty topic are ignored.
    pub async fn publish_message(&self, message: Message) {
        if message.topic.is_empty() {
            return;
        }
        self.enqueue(Command::Publish(Arc::new(message))).await;
    }

    /// Subscribe `conduit` to `topics`.
    ///
    /// Takes effect once the dispatcher reaches the request. Each subscribed
    /// topic is announced on its `sub_` meta-topic with the conduit as data.
    ///
    /// The subscription lasts until [`Bus::unsubscribe`], or until eviction
    /// when slow consumers are dropped. Dropping the conduit's receiver does
    /// not end it under the default policy.
    pub async fn subscribe<I>(&self, conduit: &Conduit, topics: I)
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.enqueue_subscription(conduit, topics, true).await;
    }

    /// Unsubscribe `conduit` from `topics`.
    ///
    /// Takes effect once the dispatcher reaches the request. Each topic is
    /// announced on its `unsub_` meta-topic with the conduit as data.
    pub async fn unsubscribe<I>(&self, conduit: &Conduit, topics: I)
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.enqueue_subscription(conduit, topics, false).await;
    }

    /// Return a new unique identifier. Does not go through the dispatcher.
    #[must_use]
    pub fn next_id(&self) -> String {
        self.ids.next()
    }

    /// Whether slow consumers are evicted instead of waited on.
    #[must_use]
    pub fn drop_slow_consumers(&self) -> bool {
        self.drop_slow_consumers.load(Ordering::Relaxed)
    }

    /// Switch the backpressure policy.
    ///
    /// Advisory: a fan-out already in progress may see either value.
    pub fn set_drop_slow_consumers(&self, enabled: bool) {
        self.drop_slow_consumers.store(enabled, Ordering::Relaxed);
    }

    /// Get the token that shuts the bus down.
    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }

    /// Check if the bus has been cancelled or its dispatcher has exited.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled() || self.stopped.is_cancelled()
    }

    /// Wait until the dispatcher has exited and cleared its registry.
    pub async fn stopped(&self) {
        self.stopped.cancelled().await;
    }

    async fn enqueue_subscription<I>(&self, conduit: &Conduit, topics: I, active: bool)
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let topics: Vec<String> = topics
            .into_iter()
            .map(Into::into)
            .filter(|t: &String| !t.is_empty())
            .collect();
        if topics.is_empty() {
            return;
        }
        self.enqueue(Command::Subscription(Subscription {
            topics,
            conduit: conduit.clone(),
            active,
        }))
        .await;
    }

    async fn enqueue(&self, command: Command) {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => {
                trace!("Bus cancelled, command dropped");
            }
            res = self.commands.send(command) => {
                if res.is_err() {
                    trace!("Dispatcher gone, command dropped");
                }
            }
        }
    }
}

impl fmt::Debug for Bus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bus")
            .field("queue_capacity", &self.commands.max_capacity())
            .field("drop_slow_consumers", &self.drop_slow_consumers())
            .field("closed", &self.is_closed())
            .finish()
    }
}
