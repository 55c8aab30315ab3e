//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a signal is read,
//! we can register the current computation as a dependent.
//!
//! # Implementation
//!
//! We use a thread-local stack to track the currently executing computation.
//! When entering a reactive context (e.g., running an effect), we push the
//! subscriber onto the stack. When the computation completes, we pop it.
//!
//! An untracked frame (see [`untrack`]) sits on the same stack and hides any
//! tracking frame below it, so reads inside it register nothing.

use std::cell::RefCell;
use std::sync::Arc;

use super::runtime::{Reactive, Source};
use super::SubscriberId;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<Option<ContextEntry>>> = const { RefCell::new(Vec::new()) };
}

/// An entry in the reactive context stack.
struct ContextEntry {
    /// The computation that is currently running.
    subscriber: Arc<dyn Reactive>,
    /// Sources read during this computation, in first-read order.
    dependencies: Vec<Arc<dyn Source>>,
}

/// Guard that pops the context when dropped.
///
/// This keeps the stack balanced even if the computation panics.
pub struct ReactiveContext {
    subscriber_id: Option<SubscriberId>,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given subscriber.
    ///
    /// While this context is active, any signals that are read will
    /// register the subscriber as a dependent.
    pub fn enter(subscriber: Arc<dyn Reactive>) -> Self {
        let subscriber_id = subscriber.subscriber_id();
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(Some(ContextEntry {
                subscriber,
                dependencies: Vec::new(),
            }));
        });

        Self {
            subscriber_id: Some(subscriber_id),
        }
    }

    /// Enter a frame in which reads are not tracked.
    pub fn enter_untracked() -> Self {
        CONTEXT_STACK.with(|stack| stack.borrow_mut().push(None));
        Self { subscriber_id: None }
    }

    /// Check if reads are currently being tracked.
    pub fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| matches!(stack.borrow().last(), Some(Some(_))))
    }

    /// Get the current subscriber, if any.
    pub fn current_subscriber() -> Option<Arc<dyn Reactive>> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .and_then(Option::as_ref)
                .map(|entry| Arc::clone(&entry.subscriber))
        })
    }

    /// Record a dependency on the given source.
    ///
    /// Called by signals when they are read. Repeated reads of the same
    /// source are recorded once.
    pub fn track_dependency(source: Arc<dyn Source>) {
        CONTEXT_STACK.with(|stack| {
            if let Some(Some(entry)) = stack.borrow_mut().last_mut() {
                let id = source.source_id();
                if !entry.dependencies.iter().any(|s| s.source_id() == id) {
                    entry.dependencies.push(source);
                }
            }
        });
    }

    /// Source IDs collected in the current context.
    pub fn dependency_ids() -> Vec<u64> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .and_then(Option::as_ref)
                .map(|entry| entry.dependencies.iter().map(|s| s.source_id()).collect())
                .unwrap_or_default()
        })
    }

    /// Take the sources collected in the current context, leaving it empty.
    pub fn take_dependencies() -> Vec<Arc<dyn Source>> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow_mut()
                .last_mut()
                .and_then(Option::as_mut)
                .map(|entry| std::mem::take(&mut entry.dependencies))
                .unwrap_or_default()
        })
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();

            if let Some(frame) = popped {
                debug_assert_eq!(
                    frame.as_ref().map(|entry| entry.subscriber.subscriber_id()),
                    self.subscriber_id,
                    "ReactiveContext mismatch"
                );
            }
        });
    }
}

/// Run `f` without registering any dependencies.
pub fn untrack<R>(f: impl FnOnce() -> R) -> R {
    let _frame = ReactiveContext::enter_untracked();
    f()
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Subscriber;

    struct FakeSource(u64);

    impl Source for FakeSource {
        fn source_id(&self) -> u64 {
            self.0
        }

        fn unsubscribe(&self, _subscriber_id: SubscriberId) {}
    }

    fn subscriber() -> Arc<dyn Reactive> {
        Arc::new(Subscriber::new(|| {}))
    }

    #[test]
    fn context_tracks_subscriber() {
        let sub = subscriber();
        let id = sub.subscriber_id();

        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_subscriber().is_none());

        {
            let _ctx = ReactiveContext::enter(sub);

            assert!(ReactiveContext::is_active());
            assert_eq!(
                ReactiveContext::current_subscriber().map(|s| s.subscriber_id()),
                Some(id)
            );
        }

        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_subscriber().is_none());
    }

    #[test]
    fn context_deduplicates_dependencies() {
        let _ctx = ReactiveContext::enter(subscriber());

        ReactiveContext::track_dependency(Arc::new(FakeSource(1)));
        ReactiveContext::track_dependency(Arc::new(FakeSource(2)));
        ReactiveContext::track_dependency(Arc::new(FakeSource(1)));
        ReactiveContext::track_dependency(Arc::new(FakeSource(3)));

        assert_eq!(ReactiveContext::dependency_ids(), vec![1, 2, 3]);
        assert_eq!(ReactiveContext::take_dependencies().len(), 3);
        assert!(ReactiveContext::dependency_ids().is_empty());
    }

    #[test]
    fn untracked_frame_hides_outer_context() {
        let _ctx = ReactiveContext::enter(subscriber());

        untrack(|| {
            assert!(!ReactiveContext::is_active());
            ReactiveContext::track_dependency(Arc::new(FakeSource(7)));
        });

        assert!(ReactiveContext::is_active());
        assert!(ReactiveContext::dependency_ids().is_empty());
    }

    #[test]
    fn nested_contexts() {
        let outer = subscriber();
        let inner = subscriber();
        let outer_id = outer.subscriber_id();
        let inner_id = inner.subscriber_id();

        {
            let _ctx1 = ReactiveContext::enter(outer);
            {
                let _ctx2 = ReactiveContext::enter(inner);
                assert_eq!(
                    ReactiveContext::current_subscriber().map(|s| s.subscriber_id()),
                    Some(inner_id)
                );
            }
            assert_eq!(
                ReactiveContext::current_subscriber().map(|s| s.subscriber_id()),
                Some(outer_id)
            );
        }

        assert!(ReactiveContext::current_subscriber().is_none());
    }
}
