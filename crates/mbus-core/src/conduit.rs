//! Subscriber conduits.
//!
//! A conduit is the bounded delivery handle a consumer registers with the bus.
//! The consumer creates it and keeps the receiving half; the bus only ever holds
//! clones of the sending half, keyed by the conduit's identity.

use crate::message::Message;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// A unique conduit identifier.
pub type ConduitId = u64;

/// Receiving half of a conduit, owned by the consumer.
pub type MessageReceiver = mpsc::Receiver<Arc<Message>>;

static CONDUIT_COUNTER: AtomicU64 = AtomicU64::new(1);

/// A caller-owned, bounded delivery handle.
///
/// Clones refer to the same conduit: they compare equal and hash the same, which
/// is what registry membership is based on.
///
/// Unsubscribe a conduit before dropping its receiver. While slow consumers are
/// kept (the default policy) the bus never evicts, so a conduit whose receiver
/// is gone stays subscribed and is offered every message on its topics.
#[derive(Clone)]
pub struct Conduit {
    id: ConduitId,
    sender: mpsc::Sender<Arc<Message>>,
}

impl Conduit {
    /// Create a conduit able to buffer `capacity` undelivered messages.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, MessageReceiver) {
        let (sender, receiver) = mpsc::channel(capacity);
        let conduit = Self {
            id: CONDUIT_COUNTER.fetch_add(1, Ordering::Relaxed),
            sender,
        };
        (conduit, receiver)
    }

    /// Get the conduit identifier.
    #[must_use]
    pub fn id(&self) -> ConduitId {
        self.id
    }

    /// Number of messages the conduit can buffer in total.
    #[must_use]
    pub fn max_capacity(&self) -> usize {
        self.sender.max_capacity()
    }

    /// Number of free buffer slots right now.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.sender.capacity()
    }

    /// Number of messages waiting to be received.
    #[must_use]
    pub fn len(&self) -> usize {
        self.max_capacity() - self.capacity()
    }

    /// Check if no messages are waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if the consumer dropped its receiver.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    pub(crate) fn sender(&self) -> &mpsc::Sender<Arc<Message>> {
        &self.sender
    }
}

impl PartialEq for Conduit {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Conduit {}

impl Hash for Conduit {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Conduit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Conduit")
            .field("id", &self.id)
            .field("len", &self.len())
            .field("max_capacity", &self.max_capacity())
            .finish()
    }
}

impl fmt::Display for Conduit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conduit#{}", self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_conduit_identity() {
        let (a, _rx_a) = Conduit::channel(4);
        let (b, _rx_b) = Conduit::channel(4);

        assert_ne!(a, b);
        assert_eq!(a, a.clone());

        let set: HashSet<Conduit> = [a.clone(), a.clone(), b.clone()].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_conduit_capacity_tracking() {
        let (conduit, mut rx) = Conduit::channel(2);
        assert_eq!(conduit.max_capacity(), 2);
        assert!(conduit.is_empty());

        let msg = Arc::new(Message::new("t", 1_u8));
        conduit.sender().try_send(msg.clone()).unwrap();
        assert_eq!(conduit.len(), 1);
        assert_eq!(conduit.capacity(), 1);

        conduit.sender().try_send(msg).unwrap();
        assert_eq!(conduit.len(), 2);
        assert_eq!(conduit.capacity(), 0);

        rx.try_recv().unwrap();
        assert_eq!(conduit.len(), 1);
    }

    #[test]
    fn test_conduit_closed() {
        let (conduit, rx) = Conduit::channel(1);
        assert!(!conduit.is_closed());
        drop(rx);
        assert!(conduit.is_closed());
    }

    #[test]
    fn test_conduit_display() {
        let (conduit, _rx) = Conduit::channel(1);
        assert_eq!(conduit.to_string(), format!("conduit#{}", conduit.id()));
    }
}
