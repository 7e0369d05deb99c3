//! Topic registry.
//!
//! Maps each topic to the set of conduits subscribed to it. Only the dispatcher
//! owns one, so it carries no synchronization of its own.

use crate::conduit::Conduit;
use std::collections::{HashMap, HashSet};

/// Mapping from exact topic name to subscribed conduits.
///
/// A topic entry never exists with an empty set: removing the last conduit
/// deletes the entry.
#[derive(Debug, Default)]
pub struct Registry {
    topics: HashMap<String, HashSet<Conduit>>,
}

impl Registry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the conduits subscribed to `topic`.
    #[must_use]
    pub fn lookup(&self, topic: &str) -> Option<&HashSet<Conduit>> {
        self.topics.get(topic)
    }

    /// Check if `conduit` is subscribed to `topic`.
    #[must_use]
    pub fn contains(&self, topic: &str, conduit: &Conduit) -> bool {
        self.topics
            .get(topic)
            .is_some_and(|conduits| conduits.contains(conduit))
    }

    /// Subscribe `conduit` to `topic`, creating the entry if needed.
    ///
    /// Returns `true` if the conduit was not already subscribed.
    pub fn add(&mut self, topic: &str, conduit: &Conduit) -> bool {
        if let Some(conduits) = self.topics.get_mut(topic) {
            return conduits.insert(conduit.clone());
        }
        self.topics
            .insert(topic.to_string(), HashSet::from([conduit.clone()]));
        true
    }

    /// Unsubscribe `conduit` from `topic`, pruning the entry if it empties.
    ///
    /// Returns `true` if the conduit was subscribed.
    pub fn remove(&mut self, topic: &str, conduit: &Conduit) -> bool {
        let Some(conduits) = self.topics.get_mut(topic) else {
            return false;
        };
        let removed = conduits.remove(conduit);
        if conduits.is_empty() {
            self.topics.remove(topic);
        }
        removed
    }

    /// Drop every subscription.
    pub fn clear(&mut self) {
        self.topics.clear();
    }

    /// Number of topics with at least one subscriber.
    #[must_use]
    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    /// Number of conduits subscribed to `topic`.
    #[must_use]
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics.get(topic).map_or(0, HashSet::len)
    }

    /// Check if there are no subscriptions at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// Iterate over the topics that have subscribers.
    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.topics.keys().map(String::as_str)
    }
}
