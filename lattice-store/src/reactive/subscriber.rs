//! Subscriber types for the reactive system.
//!
//! A Subscriber represents any computation that depends on reactive values.
//! Effects are subscribers, and so are plain callbacks registered directly on
//! a signal with [`Signal::subscribe`](super::Signal::subscribe).

use std::sync::atomic::{AtomicU64, Ordering};

use super::runtime::Reactive;

/// Unique identifier for a subscriber.
///
/// Each subscriber (effect, callback, or other reactive computation) gets a
/// unique ID when created. This ID is used to track dependencies and avoid
/// duplicate subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// A callback subscriber.
///
/// The callback is invoked every time one of the signals it is registered
/// with notifies, subject to batching.
pub struct Subscriber {
    id: SubscriberId,
    notify: Box<dyn Fn() + Send + Sync>,
}

impl Subscriber {
    /// Create a new subscriber with a fresh ID.
    pub fn new<F>(notify: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::with_id(SubscriberId::new(), notify)
    }

    /// Create a subscriber under an existing ID.
    pub fn with_id<F>(id: SubscriberId, notify: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            id,
            notify: Box::new(notify),
        }
    }

    /// Get the subscriber's unique ID.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Notify the subscriber that one of its dependencies changed.
    pub fn notify(&self) {
        (self.notify)();
    }
}

impl Reactive for Subscriber {
    fn subscriber_id(&self) -> SubscriberId {
        self.id
    }

    fn schedule(&self) {
        self.notify();
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
