//! Store Engine
//!
//! Owns the canonical state tree and ties the layers together. Every write
//! follows the same order:
//!
//! 1. The value access layer mutates the tree.
//! 2. The middleware pipeline observes the committed write.
//! 3. The notification pass refreshes affected signals inside one batch.
//! 4. History records a snapshot (if enabled).
//! 5. Persistence schedules a debounced save (if configured).
//!
//! # Notification Pass
//!
//! For a write at `p` the pass refreshes the signal at `p`, then every
//! registered ancestor of `p` (deepest first), then every registered
//! descendant. Refreshing re-reads the tree, so a descendant whose location
//! vanished reads `None`. Cells whose value is unchanged do not notify.

use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::{debug, trace, warn};

use super::access;
use super::history::{History, HistoryMode};
use super::middleware::{devtools, Middleware, Pipeline, WriteEvent};
use super::options::StoreOptions;
use super::path::{self, PathCodec, Segment};
use super::persist::Persistence;
use super::registry::{PathSignal, SignalRegistry};
use super::view::StoreView;
use crate::error::StoreError;
use crate::reactive::Runtime;

pub(crate) struct StoreInner {
    state: RwLock<Value>,
    registry: SignalRegistry,
    paths: PathCodec,
    middleware: Pipeline,
    history: Option<Mutex<History>>,
    persistence: Option<Persistence>,
}

impl StoreInner {
    fn persist_now(&self) {
        if let Some(persistence) = &self.persistence {
            let state = self.state.read_recursive();
            persistence.save(&state, &self.paths);
        }
    }
}

/// Handle to a reactive store. Clones share the same state.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// Build a store, overlaying persisted data onto `initial` if configured.
    pub fn new(initial: Value, options: StoreOptions) -> Self {
        let paths = PathCodec::new(options.path_cache_capacity);
        let persistence = options.persist.map(Persistence::new);
        let initial = match &persistence {
            Some(persistence) => persistence.hydrate(initial, &paths),
            None => initial,
        };

        let mut middleware = options.middleware;
        if options.devtools {
            middleware.push(devtools());
        }
        let history = options
            .history_limit
            .map(|limit| Mutex::new(History::new(initial.clone(), limit)));

        debug!(
            middleware = middleware.len(),
            history = history.is_some(),
            persist = persistence.is_some(),
            "created store"
        );

        Self {
            inner: Arc::new(StoreInner {
                state: RwLock::new(initial),
                registry: SignalRegistry::new(),
                paths,
                middleware: Pipeline::new(middleware),
                history,
                persistence,
            }),
        }
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// The root view.
    pub fn view(&self) -> StoreView {
        StoreView::new(self.clone(), String::new())
    }

    /// A view at `path`, created without reading anything.
    pub fn at(&self, path: &str) -> StoreView {
        StoreView::new(self.clone(), path.to_string())
    }

    /// The registry cell for `path`, created on first use.
    pub fn signal(&self, path: &str) -> PathSignal {
        self.inner
            .registry
            .get_or_create(path, || self.get_untracked(path))
    }

    /// Tracked read: subscribes the current reactive context to `path`.
    pub fn get(&self, path: &str) -> Option<Value> {
        self.signal(path).get()
    }

    /// Read `path` without registering a dependency or a signal.
    pub fn get_untracked(&self, path: &str) -> Option<Value> {
        let segments = self.inner.paths.split(path);
        access::read(&self.inner.state.read_recursive(), &segments)
    }

    /// Borrow the whole tree without tracking. `f` must not write the store.
    pub fn with_state<R>(&self, f: impl FnOnce(&Value) -> R) -> R {
        f(&self.inner.state.read_recursive())
    }

    /// Clone of the whole tree.
    pub fn snapshot(&self) -> Value {
        self.inner.state.read_recursive().clone()
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Write `value` at `path`, creating missing containers on the way.
    pub fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        let segments = self.inner.paths.split(path);
        let previous = {
            let mut state = self.inner.state.write();
            access::write(&mut state, &segments, value.clone())
        }
        .inspect_err(|error| warn!(path, %error, "rejected write"))?;

        debug!(path, "store write");
        self.commit(path, Some(&value), previous.as_ref());
        Ok(())
    }

    /// Write the result of `f` applied to the current value at `path`.
    ///
    /// A missing value is passed as `null`. `f` runs with no lock held.
    pub fn update<F>(&self, path: &str, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&Value) -> Value,
    {
        let current = self.get_untracked(path).unwrap_or(Value::Null);
        self.set(path, f(&current))
    }

    /// Write to a path given as segments.
    pub fn set_at(&self, segments: &[Segment], value: Value) -> Result<(), StoreError> {
        self.set(&path::join(segments), value)
    }

    /// Remove the value at `path`, returning it. Removing an array element
    /// shifts the ones after it.
    pub fn delete(&self, path: &str) -> Option<Value> {
        let segments = self.inner.paths.split(path);
        let removed = access::remove(&mut self.inner.state.write(), &segments)?;

        debug!(path, "store delete");
        self.commit(path, None, Some(&removed));
        Some(removed)
    }

    /// Replace the whole tree.
    pub fn replace(&self, value: Value) {
        let previous = std::mem::replace(&mut *self.inner.state.write(), value.clone());
        debug!("store replace");
        self.commit("", Some(&value), Some(&previous));
    }

    /// Apply `f` to a copy of the sequence at `path` and write it back as one
    /// write, with one notification pass for the sequence path.
    pub(crate) fn mutate_sequence<R>(
        &self,
        path: &str,
        f: impl FnOnce(&mut Vec<Value>) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        let segments = self.inner.paths.split(path);
        let previous = match self.get_untracked(path) {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(StoreError::NotASequence {
                    path: path.to_string(),
                })
            }
        };

        let mut items = previous.clone();
        let result = f(&mut items)?;
        let next = Value::Array(items);

        Runtime::batch(|| {
            access::write(&mut self.inner.state.write(), &segments, next.clone())?;
            debug!(path, "sequence write");
            self.commit(path, Some(&next), Some(&Value::Array(previous)));
            Ok(result)
        })
    }

    /// Run `f` in one batch: subscribers run once, after `f` returns.
    pub fn batch<R>(&self, f: impl FnOnce() -> R) -> R {
        Runtime::batch(f)
    }

    /// Run `f` as one batch recorded as a single labeled history snapshot.
    pub fn transaction<R>(&self, label: &str, f: impl FnOnce() -> R) -> R {
        if let Some(history) = &self.inner.history {
            history.lock().suspend();
        }
        let _resume = Resume { store: self, label };
        Runtime::batch(f)
    }

    /// Add middleware after construction.
    pub fn use_middleware(&self, middleware: Middleware) {
        self.inner.middleware.push(middleware);
    }

    fn commit(&self, path: &str, value: Option<&Value>, previous: Option<&Value>) {
        {
            let state = self.inner.state.read_recursive();
            self.inner.middleware.run(&WriteEvent {
                state: &state,
                path,
                value,
                previous,
            });
        }
        self.notify(path);
        self.record(None);
        self.schedule_persist(path);
    }

    // ------------------------------------------------------------------
    // Notification
    // ------------------------------------------------------------------

    fn notify(&self, path: &str) {
        let scope = self.notification_scope(path);
        Runtime::batch(|| self.refresh(self.inner.registry.affected(scope)));
    }

    /// Widest path a write at `path` can change. Writing or removing an array
    /// element, or its `length`, can shift siblings and resize the array, so
    /// the pass covers the whole array.
    fn notification_scope<'a>(&self, path: &'a str) -> &'a str {
        let segments = self.inner.paths.split(path);
        let Some((last, parents)) = segments.split_last() else {
            return path;
        };
        let resizes = match last {
            Segment::Index(_) => true,
            Segment::Key(key) => key == "length",
        };
        let in_array = resizes
            && matches!(
                access::lookup(&self.inner.state.read_recursive(), parents),
                Some(Value::Array(_))
            );
        if in_array {
            path::ancestors(path).next().unwrap_or(path)
        } else {
            path
        }
    }

    /// Refresh every registered signal.
    fn refresh_all(&self) {
        Runtime::batch(|| self.refresh(self.inner.registry.all()));
    }

    fn refresh<I>(&self, entries: I)
    where
        I: IntoIterator<Item = (String, PathSignal)>,
    {
        let fresh: Vec<_> = {
            let state = self.inner.state.read_recursive();
            entries
                .into_iter()
                .map(|(key, signal)| {
                    let value = access::read(&state, &self.inner.paths.split(&key));
                    (key, signal, value)
                })
                .collect()
        };

        for (key, signal, value) in fresh {
            if signal.set_if_changed(value) {
                trace!(path = %key, "refreshed signal");
            }
        }
    }

    /// Number of registered path signals.
    pub fn signal_count(&self) -> usize {
        self.inner.registry.len()
    }

    /// Drop registry entries nobody holds or subscribes to.
    pub fn prune_signals(&self) -> usize {
        let pruned = self.inner.registry.prune();
        trace!(pruned, "pruned path signals");
        pruned
    }

    // ------------------------------------------------------------------
    // History
    // ------------------------------------------------------------------

    fn record(&self, label: Option<String>) {
        if let Some(history) = &self.inner.history {
            let mut history = history.lock();
            history.commit(&self.inner.state.read_recursive(), label);
        }
    }

    /// Step back one snapshot. Returns `false` at the start of history or
    /// when history is disabled.
    pub fn undo(&self) -> bool {
        self.travel(History::undo, "undo")
    }

    /// Step forward one snapshot. Returns `false` at the tail.
    pub fn redo(&self) -> bool {
        self.travel(History::redo, "redo")
    }

    fn travel(&self, step: fn(&mut History) -> Option<Value>, direction: &str) -> bool {
        let Some(history) = &self.inner.history else {
            return false;
        };
        let restored = {
            let mut history = history.lock();
            let restored = step(&mut history);
            if restored.is_some() {
                history.set_mode(HistoryMode::Replaying);
            }
            restored
        };
        let Some(state) = restored else {
            return false;
        };

        *self.inner.state.write() = state;
        let _recording = Recording(history);
        self.refresh_all();
        self.schedule_persist("");
        debug!(direction, "history step");
        true
    }

    pub fn can_undo(&self) -> bool {
        self.inner
            .history
            .as_ref()
            .is_some_and(|history| history.lock().can_undo())
    }

    pub fn can_redo(&self) -> bool {
        self.inner
            .history
            .as_ref()
            .is_some_and(|history| history.lock().can_redo())
    }

    /// Reset history to the current state.
    pub fn clear_history(&self) {
        if let Some(history) = &self.inner.history {
            history.lock().clear(&self.inner.state.read_recursive());
        }
    }

    /// Number of snapshots held, 0 when history is disabled.
    pub fn history_len(&self) -> usize {
        self.inner
            .history
            .as_ref()
            .map_or(0, |history| history.lock().len())
    }

    /// Label of the snapshot matching the live state.
    pub fn history_label(&self) -> Option<String> {
        self.inner
            .history
            .as_ref()
            .and_then(|history| history.lock().current().label.clone())
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    fn schedule_persist(&self, path: &str) {
        let Some(persistence) = &self.inner.persistence else {
            return;
        };
        if !persistence.tracks(path) {
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let inner: Weak<StoreInner> = Arc::downgrade(&self.inner);
                let delay = persistence.debounce();
                let task = handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    if let Some(inner) = inner.upgrade() {
                        inner.persist_now();
                    }
                });
                persistence.replace_pending(task);
            }
            Err(_) => self.inner.persist_now(),
        }
    }

    /// Save now, cancelling any pending debounced save.
    pub fn flush(&self) {
        if let Some(persistence) = &self.inner.persistence {
            persistence.cancel_pending();
            self.inner.persist_now();
        }
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("signals", &self.signal_count())
            .field("middleware", &self.inner.middleware.len())
            .field("history", &self.history_len())
            .field("persist", &self.inner.persistence.is_some())
            .finish()
    }
}

/// Ends a transaction, taking its deferred snapshot.
struct Resume<'a> {
    store: &'a Store,
    label: &'a str,
}

impl Drop for Resume<'_> {
    fn drop(&mut self) {
        if let Some(history) = &self.store.inner.history {
            let deferred = history.lock().resume();
            if deferred {
                self.store.record(Some(self.label.to_string()));
            }
        }
    }
}

/// Puts history back into recording mode after a replay.
struct Recording<'a>(&'a Mutex<History>);

impl Drop for Recording<'_> {
    fn drop(&mut self) {
        self.0.lock().set_mode(HistoryMode::Recording);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{batch, Effect};
    use crate::store::middleware::middleware;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn store(initial: Value) -> Store {
        Store::new(initial, StoreOptions::default())
    }

    #[test]
    fn ancestor_signal_sees_descendant_write() {
        let store = store(json!({"a": {"b": {"c": 1}}}));
        let ab = store.signal("a.b");

        store.set("a.b.c", json!(2)).unwrap();

        assert_eq!(ab.get_untracked(), Some(json!({"c": 2})));
        assert_eq!(store.signal_count(), 1);
    }

    #[test]
    fn descendant_signal_sees_parent_overwrite() {
        let store = store(json!({"a": {"b": {"c": 1}}}));
        let abc = store.signal("a.b.c");

        store.set("a.b", json!({"d": 1})).unwrap();
        assert_eq!(abc.get_untracked(), None);

        store.set("a.b", json!({"c": 5})).unwrap();
        assert_eq!(abc.get_untracked(), Some(json!(5)));
    }

    #[test]
    fn unrelated_signals_are_left_alone() {
        let store = store(json!({"a": 1, "b": 1}));
        let b = store.signal("b");
        let runs = Arc::new(AtomicUsize::new(0));
        let runs_clone = runs.clone();
        let _effect = Effect::new(move || {
            let _ = b.get();
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });

        store.set("a", json!(2)).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn batched_updates_notify_once() {
        let store = store(json!({"count": 0}));
        let count = store.signal("count");
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        count.subscribe(crate::reactive::SubscriberId::new(), move || {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });

        batch(|| {
            for _ in 0..3 {
                store
                    .update("count", |c| json!(c.as_i64().unwrap_or(0) + 1))
                    .unwrap();
            }
        });

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(count.get_untracked(), Some(json!(3)));
    }

    #[test]
    fn deleting_element_refreshes_shifted_siblings() {
        let store = store(json!({"todos": ["a", "b", "c"]}));
        let first = store.signal("todos.0");
        let second = store.signal("todos.1");
        let third = store.signal("todos.2");
        let len = store.signal("todos.length");

        assert_eq!(store.delete("todos.0"), Some(json!("a")));

        assert_eq!(first.get_untracked(), Some(json!("b")));
        assert_eq!(second.get_untracked(), Some(json!("c")));
        assert_eq!(third.get_untracked(), None);
        assert_eq!(len.get_untracked(), Some(json!(2)));
    }

    #[test]
    fn index_write_refreshes_length() {
        let store = store(json!({"todos": []}));
        let len = store.signal("todos.length");

        store.set("todos.0", json!({"id": 1})).unwrap();
        assert_eq!(len.get_untracked(), Some(json!(1)));

        store.set("todos.3", json!({"id": 4})).unwrap();
        assert_eq!(len.get_untracked(), Some(json!(4)));
    }

    #[test]
    fn length_write_refreshes_truncated_elements() {
        let store = store(json!({"items": [1, 2, 3]}));
        let last = store.signal("items.2");

        store.set("items.length", json!(1)).unwrap();
        assert_eq!(last.get_untracked(), None);
    }

    #[test]
    fn numeric_object_keys_do_not_widen() {
        let store = store(json!({"byId": {"1": "a", "2": "b"}}));
        let other = store.signal("byId.2");
        let runs = Arc::new(AtomicUsize::new(0));
        let runs_clone = runs.clone();
        other.subscribe(crate::reactive::SubscriberId::new(), move || {
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });

        store.set("byId.1", json!("z")).unwrap();
        assert_eq!(store.notification_scope("byId.1"), "byId.1");
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn far_index_write_is_rejected() {
        let store = store(json!({"list": []}));
        let err = store.set("list.18446744073709551615", json!(1)).unwrap_err();
        assert!(matches!(err, StoreError::IndexOutOfBounds { .. }));
        assert_eq!(store.snapshot(), json!({"list": []}));
    }

    #[test]
    fn middleware_runs_before_notification() {
        let store = store(json!({"n": 1}));
        let n = store.signal("n");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        store.use_middleware(middleware(move |event| {
            seen_clone.lock().push((
                event.path.to_string(),
                event.value.cloned(),
                event.previous.cloned(),
                n.get_untracked(),
                event.state["n"].clone(),
            ));
        }));

        store.set("n", json!(2)).unwrap();

        let seen = seen.lock();
        assert_eq!(
            seen[0],
            (
                "n".to_string(),
                Some(json!(2)),
                Some(json!(1)),
                Some(json!(1)),
                json!(2)
            )
        );
    }

    #[test]
    fn rejected_write_changes_nothing() {
        let store = store(json!({"n": 1}));
        let err = store.set("n.x", json!(1)).unwrap_err();
        assert_eq!(err, StoreError::NotAContainer { path: "n".into() });
        assert_eq!(store.snapshot(), json!({"n": 1}));
    }

    #[test]
    fn delete_refreshes_signals() {
        let store = store(json!({"user": {"name": "a"}}));
        let name = store.signal("user.name");
        assert_eq!(store.delete("user.name"), Some(json!("a")));
        assert_eq!(name.get_untracked(), None);
        assert_eq!(store.delete("user.name"), None);
    }

    #[test]
    fn history_undo_redo() {
        let store = Store::new(json!({"n": 0}), StoreOptions::new().history_limit(10));
        let n = store.signal("n");
        for i in 1..=3 {
            store.set("n", json!(i)).unwrap();
        }

        assert!(store.undo());
        assert_eq!(n.get_untracked(), Some(json!(2)));
        assert!(store.can_redo());
        assert!(store.redo());
        assert_eq!(store.snapshot(), json!({"n": 3}));
        assert!(!store.redo());
    }

    #[test]
    fn transaction_records_one_labeled_snapshot() {
        let store = Store::new(json!({"a": 0, "b": 0}), StoreOptions::new().history_limit(10));
        store.transaction("both", || {
            store.set("a", json!(1)).unwrap();
            store.set("b", json!(1)).unwrap();
        });

        assert_eq!(store.history_len(), 2);
        assert_eq!(store.history_label().as_deref(), Some("both"));
        assert!(store.undo());
        assert_eq!(store.snapshot(), json!({"a": 0, "b": 0}));
    }

    #[test]
    fn history_disabled_by_default() {
        let store = store(json!({"n": 0}));
        store.set("n", json!(1)).unwrap();
        assert!(!store.can_undo());
        assert!(!store.undo());
        assert_eq!(store.history_len(), 0);
    }
}
