//! Public constructors.
//!
//! Each constructor returns a root [`StoreView`] for reading plus a
//! [`SetStore`] for writing; variants add actions or undo/redo on top.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use super::engine::Store;
use super::history::DEFAULT_HISTORY_LIMIT;
use super::options::StoreOptions;
use super::path::{self, Segment};
use super::view::StoreView;
use crate::error::StoreError;

/// Create a store, returning its root view and setter.
///
/// # Example
///
/// ```rust
/// use lattice_store::{create_store, StoreOptions};
/// use serde_json::json;
///
/// let (store, set_store) = create_store(json!({"count": 0}), StoreOptions::default());
/// set_store.update("count", |c| json!(c.as_i64().unwrap_or(0) + 1)).unwrap();
/// assert_eq!(store.value(), Some(json!({"count": 1})));
/// ```
pub fn create_store(initial: Value, options: StoreOptions) -> (StoreView, SetStore) {
    let store = Store::new(initial, options);
    (store.view(), SetStore { store })
}

/// The write half of a store.
#[derive(Clone)]
pub struct SetStore {
    store: Store,
}

impl SetStore {
    pub fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        self.store.set(path, value)
    }

    pub fn update<F>(&self, path: &str, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&Value) -> Value,
    {
        self.store.update(path, f)
    }

    /// Write to a path given segment by segment.
    pub fn set_at<I, S>(&self, segments: I, value: Value) -> Result<(), StoreError>
    where
        I: IntoIterator<Item = S>,
        S: Into<Segment>,
    {
        let segments: Vec<Segment> = segments.into_iter().map(Into::into).collect();
        self.store.set_at(&segments, value)
    }

    pub fn delete(&self, path: &str) -> Option<Value> {
        self.store.delete(path)
    }

    pub fn batch<R>(&self, f: impl FnOnce() -> R) -> R {
        self.store.batch(f)
    }

    pub fn store(&self) -> &Store {
        &self.store
    }
}

impl fmt::Debug for SetStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SetStore").field(&self.store).finish()
    }
}

/// A named store operation.
pub type Action = Arc<dyn Fn(&SetStore, Value) -> Value + Send + Sync>;

/// Named actions, in registration order.
#[derive(Clone, Default)]
pub struct Actions {
    actions: IndexMap<String, Action>,
}

impl Actions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn action<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&SetStore, Value) -> Value + Send + Sync + 'static,
    {
        self.actions.insert(name.into(), Arc::new(f));
        self
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Actions bound to a store.
#[derive(Clone)]
pub struct BoundActions {
    set_store: SetStore,
    actions: Actions,
}

impl BoundActions {
    /// Run an action as one batch and, with history on, one snapshot labeled
    /// with the action name.
    pub fn dispatch(&self, name: &str, payload: Value) -> Result<Value, StoreError> {
        let action = self
            .actions
            .actions
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::UnknownAction(name.to_string()))?;
        Ok(self
            .set_store
            .store()
            .transaction(name, || action(&self.set_store, payload)))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.actions.actions.keys().map(String::as_str)
    }
}

/// Create a store with named actions bound to its setter.
pub fn create_store_with_actions(
    initial: Value,
    actions: Actions,
    options: StoreOptions,
) -> (StoreView, SetStore, BoundActions) {
    let (store, set_store) = create_store(initial, options);
    let bound = BoundActions {
        set_store: set_store.clone(),
        actions,
    };
    (store, set_store, bound)
}

/// A store with undo/redo.
#[derive(Clone, Debug)]
pub struct UndoableStore {
    pub store: StoreView,
    pub set_store: SetStore,
}

impl UndoableStore {
    pub fn undo(&self) -> bool {
        self.set_store.store().undo()
    }

    pub fn redo(&self) -> bool {
        self.set_store.store().redo()
    }

    pub fn can_undo(&self) -> bool {
        self.set_store.store().can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.set_store.store().can_redo()
    }

    /// Drop all history, keeping the current state as the only snapshot.
    pub fn clear(&self) {
        self.set_store.store().clear_history();
    }
}

/// Create a store that records history, 100 snapshots unless
/// `options.history_limit` says otherwise.
pub fn create_undoable_store(initial: Value, mut options: StoreOptions) -> UndoableStore {
    options.history_limit.get_or_insert(DEFAULT_HISTORY_LIMIT);
    let (store, set_store) = create_store(initial, options);
    UndoableStore { store, set_store }
}

/// Setter scoped under one key of a store.
#[derive(Clone, Debug)]
pub struct SliceSetter {
    set_store: SetStore,
    prefix: String,
}

impl SliceSetter {
    /// Write at `path` relative to the slice; `""` replaces the slice itself.
    pub fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        self.set_store.set(&path::concat(&self.prefix, path), value)
    }

    pub fn update<F>(&self, path: &str, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&Value) -> Value,
    {
        self.set_store.update(&path::concat(&self.prefix, path), f)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

/// A view and setter scoped to `key` under `store`.
pub fn create_slice(store: &StoreView, set_store: &SetStore, key: &str) -> (StoreView, SliceSetter) {
    let view = store.scope(key);
    let setter = SliceSetter {
        set_store: set_store.clone(),
        prefix: view.path().to_string(),
    };
    (view, setter)
}
