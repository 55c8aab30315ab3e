//! Value Access Layer
//!
//! Plain read/write primitives over the canonical state tree. Nothing here
//! knows about signals or notification.
//!
//! Reads return `None` when any intermediate segment is missing or `null`.
//! Writes auto-create missing intermediate containers: an array when the next
//! segment is an index, an object otherwise. Arrays written past their end are
//! padded with `null`, at most [`MAX_INDEX_GAP`] slots beyond the current end.

use serde_json::{Map, Value};

use super::path::{join, Segment};
use crate::error::StoreError;

const LENGTH: &str = "length";

/// How far past the end of an array a write may reach.
pub const MAX_INDEX_GAP: usize = 1 << 16;

fn child<'a>(value: &'a Value, segment: &Segment) -> Option<&'a Value> {
    match (value, segment) {
        (Value::Object(map), Segment::Key(key)) => map.get(key),
        (Value::Object(map), Segment::Index(index)) => map.get(&index.to_string()),
        (Value::Array(items), Segment::Index(index)) => items.get(*index),
        _ => None,
    }
}

/// Borrow the value at `segments`. Does not resolve `length`.
pub fn lookup<'a>(root: &'a Value, segments: &[Segment]) -> Option<&'a Value> {
    segments
        .iter()
        .try_fold(root, |current, segment| child(current, segment))
}

/// Read the value at `segments`, resolving a trailing `length` on arrays.
pub fn read(root: &Value, segments: &[Segment]) -> Option<Value> {
    let Some((last, parents)) = segments.split_last() else {
        return Some(root.clone());
    };
    let parent = lookup(root, parents)?;
    match (parent, last) {
        (Value::Array(items), Segment::Key(key)) if key == LENGTH => Some(Value::from(items.len())),
        _ => child(parent, last).cloned(),
    }
}

fn empty_container(next: &Segment) -> Value {
    if next.is_index() {
        Value::Array(Vec::new())
    } else {
        Value::Object(Map::new())
    }
}

fn pad(items: &mut Vec<Value>, len: usize) {
    if items.len() < len {
        items.resize(len, Value::Null);
    }
}

/// Reject index segments landing more than [`MAX_INDEX_GAP`] past the end of
/// their array, whether the array exists or would be created by the write.
///
/// Runs before anything is mutated. Past this check the remaining failures
/// are hit on existing values, before any padding or vivification.
fn check_reach(root: &Value, segments: &[Segment]) -> Result<(), StoreError> {
    let mut current = Some(root);
    for (depth, segment) in segments.iter().enumerate() {
        if let Segment::Index(index) = segment {
            let len = match current {
                Some(Value::Array(items)) => Some(items.len()),
                Some(Value::Null) | None => Some(0),
                Some(_) => None,
            };
            if let Some(len) = len {
                if *index > len.saturating_add(MAX_INDEX_GAP) {
                    return Err(StoreError::IndexOutOfBounds {
                        path: join(&segments[..depth]),
                        index: *index,
                        len,
                    });
                }
            }
        }
        current = current.and_then(|value| child(value, segment));
    }
    Ok(())
}

/// Write `value` at `segments`, returning the previous value there.
///
/// On error the tree is left unchanged.
pub fn write(
    root: &mut Value,
    segments: &[Segment],
    value: Value,
) -> Result<Option<Value>, StoreError> {
    let Some((last, parents)) = segments.split_last() else {
        return Ok(Some(std::mem::replace(root, value)));
    };
    check_reach(root, segments)?;

    let mut current = root;
    for (depth, segment) in parents.iter().enumerate() {
        if current.is_null() {
            *current = empty_container(segment);
        }
        current = match (current, segment) {
            (Value::Object(map), segment) => {
                map.entry(segment.to_string()).or_insert(Value::Null)
            }
            (Value::Array(items), Segment::Index(index)) => {
                pad(items, index + 1);
                &mut items[*index]
            }
            (Value::Array(_), Segment::Key(key)) => {
                return Err(StoreError::InvalidKey {
                    path: join(&segments[..depth]),
                    key: key.clone(),
                })
            }
            _ => {
                return Err(StoreError::NotAContainer {
                    path: join(&segments[..depth]),
                })
            }
        };
    }

    if current.is_null() {
        *current = empty_container(last);
    }
    let parent_path = || join(parents);
    match (current, last) {
        (Value::Object(map), segment) => Ok(map.insert(segment.to_string(), value)),
        (Value::Array(items), Segment::Index(index)) => {
            let previous = items.get(*index).cloned();
            pad(items, index + 1);
            items[*index] = value;
            Ok(previous)
        }
        (Value::Array(items), Segment::Key(key)) if key == LENGTH => {
            let len = value
                .as_u64()
                .and_then(|len| usize::try_from(len).ok())
                .filter(|len| *len <= items.len().saturating_add(MAX_INDEX_GAP))
                .ok_or_else(|| StoreError::InvalidLength { path: parent_path() })?;
            let previous = items.len();
            items.resize(len, Value::Null);
            Ok(Some(Value::from(previous)))
        }
        (Value::Array(_), Segment::Key(key)) => Err(StoreError::InvalidKey {
            path: parent_path(),
            key: key.clone(),
        }),
        _ => Err(StoreError::NotAContainer { path: parent_path() }),
    }
}

/// Remove the value at `segments`, returning it. Array elements after the
/// removed one shift down. Removing the root resets it to `null`.
pub fn remove(root: &mut Value, segments: &[Segment]) -> Option<Value> {
    let Some((last, parents)) = segments.split_last() else {
        return Some(std::mem::take(root));
    };
    let parent = parents
        .iter()
        .try_fold(root, |current, segment| match (current, segment) {
            (Value::Object(map), segment) => map.get_mut(&segment.to_string()),
            (Value::Array(items), Segment::Index(index)) => items.get_mut(*index),
            _ => None,
        })?;
    match (parent, last) {
        (Value::Object(map), segment) => map.remove(&segment.to_string()),
        (Value::Array(items), Segment::Index(index)) if *index < items.len() => {
            Some(items.remove(*index))
        }
        _ => None,
    }
}

/// Deep-merge `overlay` into `base`. Objects merge key by key; anything else
/// in `overlay` replaces what `base` holds.
pub fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(slot) => merge(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
