//! A single tagged location with change subscriptions.

use std::fmt;

use crate::{MemoryTag, MemoryValue};

pub type SubscriptionId = u64;

/// Borrowed view handed to change subscribers after a write lands.
/// Subscribers must re-read through the snapshot API for anything beyond
/// this location; the borrow does not outlive the notification.
pub struct MemoryChange<'a> {
    pub tag: MemoryTag,
    pub value: &'a MemoryValue,
}

type Subscriber = Box<dyn FnMut(&MemoryChange<'_>)>;

pub struct MemoryLocation {
    pub tag: MemoryTag,
    value: MemoryValue,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_subscription: SubscriptionId,
}

impl MemoryLocation {
    pub(crate) fn new(tag: MemoryTag, value: MemoryValue) -> Self {
        Self {
            tag,
            value,
            subscribers: Vec::new(),
            next_subscription: 0,
        }
    }

    pub fn value(&self) -> &MemoryValue {
        &self.value
    }

    /// Replace the payload and notify subscribers in registration order.
    pub(crate) fn replace(&mut self, value: MemoryValue) {
        self.value = value;
        tracing::trace!(target: "runtime.memory", tag = %self.tag, "memory_update");
        let change = MemoryChange {
            tag: self.tag,
            value: &self.value,
        };
        for (_, subscriber) in &mut self.subscribers {
            subscriber(&change);
        }
    }

    pub fn subscribe(&mut self, subscriber: Subscriber) -> SubscriptionId {
        let id = self.next_subscription;
        self.next_subscription += 1;
        self.subscribers.push((id, subscriber));
        id
    }

    /// Returns `false` when the id was already removed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub_id, _)| *sub_id != id);
        self.subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl fmt::Debug for MemoryLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryLocation")
            .field("tag", &self.tag)
            .field("value", &self.value)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}
