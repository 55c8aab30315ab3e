//! Reactive Runtime
//!
//! The runtime decides *when* notified subscribers run. Signals hand it the
//! subscribers to wake; the runtime either runs them right away or, inside a
//! batch, queues them until the outermost batch exits.
//!
//! # Batching
//!
//! 1. `batch` increments a thread-local depth counter.
//!
//! 2. While the depth is non-zero, notified subscribers are queued. A
//!    subscriber notified several times is queued once.
//!
//! 3. When the outermost batch exits, the queue is flushed. Subscribers that
//!    write signals during the flush are themselves batched, so the flush
//!    repeats until the queue is empty.
//!
//! A notification outside any batch is treated as a batch of size one.

use std::cell::{Cell, RefCell};
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::warn;

use super::subscriber::SubscriberId;

/// Upper bound on flush rounds before the runtime gives up on a feedback loop.
const MAX_FLUSH_ROUNDS: usize = 1024;

/// A trait for computations that can be woken by a signal.
pub trait Reactive: Send + Sync {
    /// Get the subscriber ID for this reactive value.
    fn subscriber_id(&self) -> SubscriberId;

    /// Run the computation now.
    fn schedule(&self);
}

/// A trait for values that computations can depend on.
pub trait Source: Send + Sync {
    /// Unique identifier of the source.
    fn source_id(&self) -> u64;

    /// Stop notifying the given subscriber.
    fn unsubscribe(&self, subscriber_id: SubscriberId);
}

thread_local! {
    static BATCH_DEPTH: Cell<usize> = const { Cell::new(0) };
    static PENDING: RefCell<IndexMap<SubscriberId, Arc<dyn Reactive>>> = RefCell::new(IndexMap::new());
}

/// Guard that leaves the batch when dropped.
struct BatchGuard;

impl Drop for BatchGuard {
    fn drop(&mut self) {
        let outermost = BATCH_DEPTH.with(|depth| {
            let next = depth.get().saturating_sub(1);
            depth.set(next);
            next == 0
        });

        if !outermost {
            return;
        }

        if std::thread::panicking() {
            PENDING.with(|pending| pending.borrow_mut().clear());
        } else {
            Runtime::flush();
        }
    }
}

/// Coordinator for batched notification.
pub struct Runtime;

impl Runtime {
    /// Run `f` inside a batching scope.
    ///
    /// Nested batches coalesce into the outermost one.
    pub fn batch<R>(f: impl FnOnce() -> R) -> R {
        BATCH_DEPTH.with(|depth| depth.set(depth.get() + 1));
        let _guard = BatchGuard;
        f()
    }

    /// Check whether a batch is open on this thread.
    pub fn is_batching() -> bool {
        BATCH_DEPTH.with(|depth| depth.get() > 0)
    }

    /// Current batch nesting depth.
    pub fn batch_depth() -> usize {
        BATCH_DEPTH.with(Cell::get)
    }

    /// Wake the given subscribers.
    ///
    /// Inside a batch they are queued; otherwise they run inside a fresh batch
    /// so writes they perform are coalesced as well.
    pub fn notify<I>(subscribers: I)
    where
        I: IntoIterator<Item = Arc<dyn Reactive>>,
    {
        Self::batch(|| {
            PENDING.with(|pending| {
                let mut pending = pending.borrow_mut();
                for subscriber in subscribers {
                    pending.entry(subscriber.subscriber_id()).or_insert(subscriber);
                }
            });
        });
    }

    /// Number of subscribers waiting for the current batch to end.
    pub fn pending_count() -> usize {
        PENDING.with(|pending| pending.borrow().len())
    }

    /// Run queued subscribers until none are left.
    fn flush() {
        for _ in 0..MAX_FLUSH_ROUNDS {
            let round = PENDING.with(|pending| std::mem::take(&mut *pending.borrow_mut()));
            if round.is_empty() {
                return;
            }

            // Re-open a batch so writes made by subscribers queue up for the
            // next round instead of recursing.
            BATCH_DEPTH.with(|depth| depth.set(depth.get() + 1));
            let _guard = FlushGuard;
            for subscriber in round.into_values() {
                subscriber.schedule();
            }
        }

        let dropped = PENDING.with(|pending| {
            let mut pending = pending.borrow_mut();
            let count = pending.len();
            pending.clear();
            count
        });
        warn!(dropped, "reactive flush did not settle, dropping pending subscribers");
    }
}

/// Closes the batch re-opened by a flush round without flushing again.
struct FlushGuard;

impl Drop for FlushGuard {
    fn drop(&mut self) {
        BATCH_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Batch multiple signal updates together.
///
/// Subscribers touched by several writes inside `f` run once, after `f`
/// returns.
pub fn batch<R>(f: impl FnOnce() -> R) -> R {
    Runtime::batch(f)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
