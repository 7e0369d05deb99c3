//! Message types for the bus.
//!
//! A [`Message`] is a topic plus an opaque, shared data reference. The bus wraps
//! each published message in a single `Arc` and hands that same instance to every
//! subscribed conduit, so consumers must treat the data as read-only.

use crate::conduit::Conduit;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Prefix of the meta-topic announcing a new subscription to a topic.
pub const SUB_TOPIC_PREFIX: &str = "sub_";

/// Prefix of the meta-topic announcing a removed subscription from a topic.
pub const UNSUB_TOPIC_PREFIX: &str = "unsub_";

/// Opaque message data, shared between every receiver of a message.
pub type Data = Arc<dyn Any + Send + Sync>;

/// Name of the meta-topic that announces subscriptions to `topic`.
#[must_use]
pub fn sub_topic(topic: &str) -> String {
    format!("{SUB_TOPIC_PREFIX}{topic}")
}

/// Name of the meta-topic that announces unsubscriptions from `topic`.
#[must_use]
pub fn unsub_topic(topic: &str) -> String {
    format!("{UNSUB_TOPIC_PREFIX}{topic}")
}

/// A published message.
#[derive(Clone)]
pub struct Message {
    /// Target topic.
    pub topic: String,
    /// Message data (shared, never copied during fan-out).
    pub data: Data,
}

impl Message {
    /// Create a new message, moving `data` behind a fresh shared reference.
    ///
    /// The message is not published; hand it to
    /// [`Bus::publish_message`](crate::Bus::publish_message) for that.
    #[must_use]
    pub fn new<T>(topic: impl Into<String>, data: T) -> Self
    where
        T: Any + Send + Sync,
    {
        Self::from_shared(topic, Arc::new(data))
    }

    /// Create a message around an existing shared data reference.
    #[must_use]
    pub fn from_shared(topic: impl Into<String>, data: Data) -> Self {
        Self {
            topic: topic.into(),
            data,
        }
    }

    /// Get the topic.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Borrow the data as `T`, if that is what it holds.
    #[must_use]
    pub fn data<T: Any>(&self) -> Option<&T> {
        self.data.downcast_ref::<T>()
    }

    /// Get the shared data reference.
    #[must_use]
    pub fn shared_data(&self) -> &Data {
        &self.data
    }

    /// The conduit carried by a `sub_`/`unsub_` lifecycle notification.
    #[must_use]
    pub fn conduit(&self) -> Option<&Conduit> {
        self.data::<Conduit>()
    }

    /// Check whether this message was published on a lifecycle meta-topic.
    #[must_use]
    pub fn is_lifecycle(&self) -> bool {
        self.conduit().is_some()
            && (self.topic.starts_with(SUB_TOPIC_PREFIX)
                || self.topic.starts_with(UNSUB_TOPIC_PREFIX))
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Message");
        s.field("topic", &self.topic);
        match self.conduit() {
            Some(conduit) => s.field("conduit", conduit),
            None => s.field("data", &format_args!("<opaque>")),
        };
        s.finish()
    }
}
