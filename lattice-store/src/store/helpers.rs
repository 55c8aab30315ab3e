//! Derived helpers over stores and plain values.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use serde_json::Value;

use super::view::StoreView;

/// A zero-argument reader that re-runs `selector` on every call.
///
/// Nothing is cached; reads inside `selector` are tracked by whatever context
/// calls the returned function.
pub fn derive<R, F>(store: &StoreView, selector: F) -> impl Fn() -> R
where
    F: Fn(&StoreView) -> R,
{
    let store = store.clone();
    move || selector(&store)
}

/// Apply `recipe` to a deep copy of `state` and return the copy.
pub fn produce<F>(state: &Value, recipe: F) -> Value
where
    F: FnOnce(&mut Value),
{
    let mut draft = state.clone();
    recipe(&mut draft);
    draft
}

/// Rebuild a keyed list, reusing old elements that did not change.
///
/// For every element of `next`, the first element of `previous` with the same
/// key is reused (same `Arc`) when it is structurally equal; otherwise the new
/// element is wrapped fresh.
pub fn reconcile<T, K, F>(previous: &[Arc<T>], next: Vec<T>, key: F) -> Vec<Arc<T>>
where
    T: PartialEq,
    K: Hash + Eq,
    F: Fn(&T) -> K,
{
    let mut by_key: HashMap<K, &Arc<T>> = HashMap::with_capacity(previous.len());
    for item in previous {
        by_key.entry(key(item)).or_insert(item);
    }

    next.into_iter()
        .map(|item| match by_key.get(&key(&item)) {
            Some(old) if ***old == item => Arc::clone(old),
            _ => Arc::new(item),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Store, StoreOptions};
    use serde_json::json;

    #[test]
    fn derive_reads_fresh_every_call() {
        let store = Store::new(json!({"n": 1}), StoreOptions::default());
        let doubled = derive(&store.view(), |s| {
            s.get("n").and_then(|f| f.as_value().and_then(Value::as_i64)).unwrap_or(0) * 2
        });

        assert_eq!(doubled(), 2);
        store.set("n", json!(5)).unwrap();
        assert_eq!(doubled(), 10);
    }

    #[test]
    fn produce_leaves_input_untouched() {
        let state = json!({"items": [1]});
        let next = produce(&state, |draft| {
            draft["items"].as_array_mut().unwrap().push(json!(2));
        });
        assert_eq!(state, json!({"items": [1]}));
        assert_eq!(next, json!({"items": [1, 2]}));
    }

    #[test]
    fn reconcile_reuses_unchanged_rows() {
        let id = |row: &Value| row["id"].as_i64();
        let previous: Vec<Arc<Value>> = vec![
            Arc::new(json!({"id": 1, "text": "a"})),
            Arc::new(json!({"id": 2, "text": "b"})),
        ];
        let next = vec![
            json!({"id": 2, "text": "b"}),
            json!({"id": 1, "text": "changed"}),
            json!({"id": 3, "text": "new"}),
        ];

        let merged = reconcile(&previous, next, id);

        assert!(Arc::ptr_eq(&merged[0], &previous[1]));
        assert!(!Arc::ptr_eq(&merged[1], &previous[0]));
        assert_eq!(*merged[1], json!({"id": 1, "text": "changed"}));
        assert_eq!(*merged[2], json!({"id": 3, "text": "new"}));
    }
}
