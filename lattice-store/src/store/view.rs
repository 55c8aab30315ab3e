//! Reactive Views
//!
//! A [`StoreView`] is a handle on one location of the state tree. Reading
//! through it registers a dependency on exactly the path that was read; nested
//! objects and arrays come back as further views, built fresh on every read.
//! Writing through it routes to the store's write path.
//!
//! Views over arrays carry the sequence API (`push`, `splice`, ...). Each such
//! call is one write with one notification pass for the array's own path, and
//! [`len`](StoreView::len) tracks `<path>.length` so a consumer reading only
//! the length re-runs on resizes and not on element edits.

use std::cmp::Ordering;
use std::fmt;

use serde_json::Value;

use super::engine::Store;
use super::path::{self, Segment};
use crate::error::StoreError;

/// Result of reading one key through a view.
#[derive(Debug, Clone)]
pub enum Field {
    /// An object or array, wrapped for further tracked access.
    Node(StoreView),
    /// A scalar.
    Value(Value),
}

impl Field {
    pub fn as_node(&self) -> Option<&StoreView> {
        match self {
            Field::Node(view) => Some(view),
            Field::Value(_) => None,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Field::Node(_) => None,
            Field::Value(value) => Some(value),
        }
    }

    /// The plain value. Nodes are read without tracking.
    pub fn into_value(self) -> Value {
        match self {
            Field::Node(view) => view.store.get_untracked(&view.path).unwrap_or(Value::Null),
            Field::Value(value) => value,
        }
    }
}

/// A tracked handle on one path of a store.
#[derive(Clone)]
pub struct StoreView {
    store: Store,
    path: String,
}

impl StoreView {
    pub(crate) fn new(store: Store, path: String) -> Self {
        Self { store, path }
    }

    /// Always `true`; lets callers tell store views from plain values.
    pub fn is_store_node(&self) -> bool {
        true
    }

    /// Canonical path of this view.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Tracked read of the value this view points at.
    pub fn value(&self) -> Option<Value> {
        self.store.get(&self.path)
    }

    /// Tracked read of one key.
    pub fn get(&self, key: impl Into<Segment>) -> Option<Field> {
        let path = path::child(&self.path, &key.into());
        let value = self.store.get(&path)?;
        Some(match value {
            Value::Object(_) | Value::Array(_) => Field::Node(StoreView::new(self.store.clone(), path)),
            scalar => Field::Value(scalar),
        })
    }

    /// Tracked read of one index.
    pub fn at(&self, index: usize) -> Option<Field> {
        self.get(index)
    }

    /// Tracked read of a key expected to hold an object or array.
    pub fn node(&self, key: impl Into<Segment>) -> Option<StoreView> {
        match self.get(key)? {
            Field::Node(view) => Some(view),
            Field::Value(_) => None,
        }
    }

    /// A view at a relative path, created without reading.
    pub fn scope(&self, relative: &str) -> StoreView {
        StoreView::new(self.store.clone(), path::concat(&self.path, relative))
    }

    /// Keys of the object (or indices of the array) at this path. Tracked.
    pub fn keys(&self) -> Vec<String> {
        match self.value() {
            Some(Value::Object(map)) => map.keys().cloned().collect(),
            Some(Value::Array(items)) => (0..items.len()).map(|i| i.to_string()).collect(),
            _ => Vec::new(),
        }
    }

    pub fn set(&self, key: impl Into<Segment>, value: Value) -> Result<(), StoreError> {
        self.store.set(&path::child(&self.path, &key.into()), value)
    }

    pub fn update<F>(&self, key: impl Into<Segment>, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&Value) -> Value,
    {
        self.store.update(&path::child(&self.path, &key.into()), f)
    }

    pub fn remove(&self, key: impl Into<Segment>) -> Option<Value> {
        self.store.delete(&path::child(&self.path, &key.into()))
    }

    // ------------------------------------------------------------------
    // Sequence API
    // ------------------------------------------------------------------

    /// Length of the array at this path, 0 if there is none. Tracks only the
    /// length.
    pub fn len(&self) -> usize {
        self.store
            .get(&path::child(&self.path, &Segment::Key("length".into())))
            .and_then(|len| len.as_u64())
            .map_or(0, |len| len as usize)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append one element. Returns the new length.
    pub fn push(&self, value: Value) -> Result<usize, StoreError> {
        self.store.mutate_sequence(&self.path, |items| {
            items.push(value);
            Ok(items.len())
        })
    }

    /// Remove the last element.
    pub fn pop(&self) -> Result<Option<Value>, StoreError> {
        self.store.mutate_sequence(&self.path, |items| Ok(items.pop()))
    }

    /// Remove the first element.
    pub fn shift(&self) -> Result<Option<Value>, StoreError> {
        self.store.mutate_sequence(&self.path, |items| {
            Ok((!items.is_empty()).then(|| items.remove(0)))
        })
    }

    /// Prepend elements, keeping their order. Returns the new length.
    pub fn unshift<I>(&self, values: I) -> Result<usize, StoreError>
    where
        I: IntoIterator<Item = Value>,
    {
        self.store.mutate_sequence(&self.path, |items| {
            items.splice(0..0, values);
            Ok(items.len())
        })
    }

    /// Remove `delete_count` elements from `start` and insert `insert` there.
    ///
    /// `start` past the end is clamped to the end, as is the deleted range.
    /// Returns the removed elements.
    pub fn splice<I>(&self, start: usize, delete_count: usize, insert: I) -> Result<Vec<Value>, StoreError>
    where
        I: IntoIterator<Item = Value>,
    {
        self.store.mutate_sequence(&self.path, |items| {
            let start = start.min(items.len());
            let end = start.saturating_add(delete_count).min(items.len());
            Ok(items.splice(start..end, insert).collect())
        })
    }

    /// Insert one element at `index`.
    pub fn insert(&self, index: usize, value: Value) -> Result<(), StoreError> {
        let path = self.path.clone();
        self.store.mutate_sequence(&self.path, |items| {
            if index > items.len() {
                return Err(StoreError::IndexOutOfBounds {
                    path,
                    index,
                    len: items.len(),
                });
            }
            items.insert(index, value);
            Ok(())
        })
    }

    /// Sort with a comparator. The comparator must not touch the store.
    pub fn sort_by<F>(&self, compare: F) -> Result<(), StoreError>
    where
        F: FnMut(&Value, &Value) -> Ordering,
    {
        self.store.mutate_sequence(&self.path, |items| {
            items.sort_by(compare);
            Ok(())
        })
    }

    pub fn reverse(&self) -> Result<(), StoreError> {
        self.store.mutate_sequence(&self.path, |items| {
            items.reverse();
            Ok(())
        })
    }
}

impl fmt::Debug for StoreView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreView").field("path", &self.path).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Effect;
    use crate::store::StoreOptions;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::sync::Arc;

    fn root(initial: Value) -> StoreView {
        Store::new(initial, StoreOptions::default()).view()
    }

    fn count_runs<F>(f: F) -> (Effect, Arc<AtomicUsize>)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let runs = Arc::new(AtomicUsize::new(0));
        let runs_clone = runs.clone();
        let effect = Effect::new(move || {
            f();
            runs_clone.fetch_add(1, AtomicOrdering::SeqCst);
        });
        (effect, runs)
    }

    #[test]
    fn nested_reads_return_fresh_views() {
        let view = root(json!({"user": {"name": "a", "tags": ["x"]}}));

        let user = view.node("user").unwrap();
        assert!(user.is_store_node());
        assert_eq!(user.path(), "user");
        assert_eq!(user.get("name").unwrap().as_value(), Some(&json!("a")));
        assert_eq!(user.node("tags").unwrap().path(), "user.tags");
        assert!(view.get("missing").is_none());
    }

    #[test]
    fn reads_register_signals_per_path() {
        let view = root(json!({"a": {"b": 1}}));
        let _ = view.node("a").unwrap().get("b");
        assert_eq!(view.store().signal_count(), 2);
    }

    #[test]
    fn writes_through_view_reach_the_store() {
        let view = root(json!({"user": {}}));
        let user = view.scope("user");
        user.set("name", json!("b")).unwrap();
        user.update("visits", |v| json!(v.as_i64().unwrap_or(0) + 1)).unwrap();
        assert_eq!(view.store().snapshot(), json!({"user": {"name": "b", "visits": 1}}));
        assert_eq!(user.remove("visits"), Some(json!(1)));
        assert_eq!(user.keys(), vec!["name".to_string()]);
    }

    #[test]
    fn sequence_operations() {
        let view = root(json!({"list": [3, 1, 2]}));
        let list = view.scope("list");

        assert_eq!(list.push(json!(4)).unwrap(), 4);
        assert_eq!(list.pop().unwrap(), Some(json!(4)));
        assert_eq!(list.shift().unwrap(), Some(json!(3)));
        assert_eq!(list.unshift([json!(9), json!(8)]).unwrap(), 4);
        assert_eq!(list.value(), Some(json!([9, 8, 1, 2])));

        let removed = list.splice(1, 2, [json!(7)]).unwrap();
        assert_eq!(removed, vec![json!(8), json!(1)]);
        assert_eq!(list.value(), Some(json!([9, 7, 2])));

        list.sort_by(|a, b| a.as_i64().cmp(&b.as_i64())).unwrap();
        assert_eq!(list.value(), Some(json!([2, 7, 9])));
        list.reverse().unwrap();
        assert_eq!(list.value(), Some(json!([9, 7, 2])));
        list.insert(3, json!(0)).unwrap();
        assert_eq!(list.len(), 4);
        assert!(matches!(
            list.insert(9, json!(0)),
            Err(StoreError::IndexOutOfBounds { index: 9, len: 4, .. })
        ));
    }

    #[test]
    fn sequence_ops_on_non_arrays_fail() {
        let view = root(json!({"obj": {}}));
        assert_eq!(
            view.scope("obj").push(json!(1)),
            Err(StoreError::NotASequence { path: "obj".into() })
        );
        assert!(view.scope("missing").pop().is_err());
    }

    #[test]
    fn length_consumer_ignores_element_edits() {
        let view = root(json!({"todos": [{"text": "a"}]}));
        let todos = view.scope("todos");

        let reader = todos.clone();
        let (_effect, runs) = count_runs(move || {
            let _ = reader.len();
        });

        todos.scope("0").set("text", json!("b")).unwrap();
        assert_eq!(runs.load(AtomicOrdering::SeqCst), 1);

        todos.push(json!({"text": "c"})).unwrap();
        assert_eq!(runs.load(AtomicOrdering::SeqCst), 2);
    }

    #[test]
    fn sequence_op_notifies_once() {
        let view = root(json!({"items": [1, 2, 3]}));
        let items = view.scope("items");

        let reader = items.clone();
        let (_effect, runs) = count_runs(move || {
            let _ = reader.value();
            let _ = reader.at(0);
            let _ = reader.len();
        });

        items.splice(0, 3, [json!(4), json!(5)]).unwrap();
        assert_eq!(runs.load(AtomicOrdering::SeqCst), 2);
    }
}
