//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which computations depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read within a reactive context (an effect), the
//!    signal registers that context as a subscriber.
//!
//! 2. When a signal's value changes, all subscribers are handed to the
//!    [`Runtime`], which runs them now or at the end of the current batch.
//!
//! # Subscriptions
//!
//! Subscribers picked up through tracking are held weakly: dropping an effect
//! is enough to stop it. Callbacks registered with [`Signal::subscribe`] are
//! owned by the signal until [`Signal::unsubscribe`] is called.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};

use super::context::ReactiveContext;
use super::runtime::{Reactive, Runtime, Source};
use super::subscriber::{Subscriber, SubscriberId};

/// Counter for generating unique signal IDs.
static SIGNAL_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a new unique signal ID.
fn next_signal_id() -> u64 {
    SIGNAL_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

enum Link {
    Owned(Arc<dyn Reactive>),
    Tracked(Weak<dyn Reactive>),
}

impl Link {
    fn upgrade(&self) -> Option<Arc<dyn Reactive>> {
        match self {
            Link::Owned(subscriber) => Some(Arc::clone(subscriber)),
            Link::Tracked(weak) => weak.upgrade(),
        }
    }
}

struct SignalInner<T> {
    id: u64,
    value: RwLock<T>,
    subscribers: Mutex<IndexMap<SubscriberId, Link>>,
}

impl<T> SignalInner<T> {
    /// Collect live subscribers, dropping links to ones that are gone.
    fn live_subscribers(&self) -> Vec<Arc<dyn Reactive>> {
        let mut subscribers = self.subscribers.lock();
        let mut live = Vec::with_capacity(subscribers.len());
        subscribers.retain(|_, link| match link.upgrade() {
            Some(subscriber) => {
                live.push(subscriber);
                true
            }
            None => false,
        });
        live
    }
}

impl<T> Source for SignalInner<T>
where
    T: Send + Sync,
{
    fn source_id(&self) -> u64 {
        self.id
    }

    fn unsubscribe(&self, subscriber_id: SubscriberId) {
        self.subscribers.lock().shift_remove(&subscriber_id);
    }
}

/// A reactive signal holding a value of type T.
///
/// # Example
///
/// ```rust
/// use lattice_store::reactive::Signal;
///
/// let count = Signal::new(0);
/// count.set(5);
/// assert_eq!(count.get(), 5);
/// ```
pub struct Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<SignalInner<T>>,
}

impl<T> Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a new signal with the given initial value.
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(SignalInner {
                id: next_signal_id(),
                value: RwLock::new(value),
                subscribers: Mutex::new(IndexMap::new()),
            }),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Get the current value.
    ///
    /// If called within a reactive context, this also registers the
    /// current computation as a subscriber.
    pub fn get(&self) -> T {
        self.track();
        self.inner.value.read().clone()
    }

    /// Read the value by reference, with tracking.
    ///
    /// `f` runs under the value lock and must not write this signal.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.track();
        f(&self.inner.value.read())
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Set a new value and notify subscribers.
    pub fn set(&self, value: T) {
        *self.inner.value.write() = value;
        self.notify();
    }

    /// Update the value using a function of the previous one.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let next = f(&self.inner.value.read());
        self.set(next);
    }

    /// Register a notification callback for a subscriber.
    ///
    /// The callback is invoked whenever the signal notifies, until
    /// [`unsubscribe`](Self::unsubscribe) is called with the same ID.
    pub fn subscribe<F>(&self, subscriber_id: SubscriberId, notify: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let subscriber: Arc<dyn Reactive> = Arc::new(Subscriber::with_id(subscriber_id, notify));
        self.inner
            .subscribers
            .lock()
            .insert(subscriber_id, Link::Owned(subscriber));
    }

    /// Remove a subscriber.
    pub fn unsubscribe(&self, subscriber_id: SubscriberId) {
        self.inner.unsubscribe(subscriber_id);
    }

    /// Get the number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .lock()
            .values()
            .filter(|link| link.upgrade().is_some())
            .count()
    }

    /// Number of handles sharing this cell.
    pub(crate) fn handle_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    fn track(&self) {
        if let Some(subscriber) = ReactiveContext::current_subscriber() {
            self.inner
                .subscribers
                .lock()
                .entry(subscriber.subscriber_id())
                .or_insert_with(|| Link::Tracked(Arc::downgrade(&subscriber)));
            ReactiveContext::track_dependency(self.inner.clone());
        }
    }

    fn notify(&self) {
        let subscribers = self.inner.live_subscribers();
        if !subscribers.is_empty() {
            Runtime::notify(subscribers);
        }
    }
}

impl<T> Signal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Store `value` and notify, unless it equals the current value.
    ///
    /// Returns whether the signal changed.
    pub fn set_if_changed(&self, value: T) -> bool {
        {
            let mut current = self.inner.value.write();
            if *current == value {
                return false;
            }
            *current = value;
        }
        self.notify();
        true
    }
}

impl<T> Clone for Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Signal<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.id())
            .field("value", &self.get_untracked())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
