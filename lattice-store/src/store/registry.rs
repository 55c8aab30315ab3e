//! Signal Registry
//!
//! Maps canonical paths to the reactive cell holding the value at that path.
//! Cells are created lazily on first read and never by a refresh, so paths
//! nobody has read cost nothing when they change.

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::Value;
use smallvec::SmallVec;

use super::path;
use crate::reactive::Signal;

/// The cell type held per path. `None` means the path does not exist.
pub type PathSignal = Signal<Option<Value>>;

/// Registry entries affected by one write, in refresh order.
pub type Affected = SmallVec<[(String, PathSignal); 8]>;

#[derive(Default)]
pub struct SignalRegistry {
    entries: Mutex<IndexMap<String, PathSignal>>,
}

impl SignalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cell for `path`, creating it seeded with `seed()` if absent.
    ///
    /// `seed` runs without the registry lock held.
    pub fn get_or_create(&self, path: &str, seed: impl FnOnce() -> Option<Value>) -> PathSignal {
        if let Some(signal) = self.get(path) {
            return signal;
        }
        let value = seed();
        self.entries
            .lock()
            .entry(path.to_string())
            .or_insert_with(|| Signal::new(value))
            .clone()
    }

    pub fn get(&self, path: &str) -> Option<PathSignal> {
        self.entries.lock().get(path).cloned()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.lock().contains_key(path)
    }

    /// Entries to refresh after a write at `path`: the path itself, then its
    /// ancestors deepest first, then every registered descendant.
    pub fn affected(&self, path: &str) -> Affected {
        let entries = self.entries.lock();
        let mut affected = Affected::new();

        if let Some(signal) = entries.get(path) {
            affected.push((path.to_string(), signal.clone()));
        }
        for ancestor in path::ancestors(path) {
            if let Some(signal) = entries.get(ancestor) {
                affected.push((ancestor.to_string(), signal.clone()));
            }
        }
        affected.extend(
            entries
                .iter()
                .filter(|(key, _)| path::is_descendant(key, path))
                .map(|(key, signal)| (key.clone(), signal.clone())),
        );
        affected
    }

    /// Every registered entry, in registration order.
    pub fn all(&self) -> Vec<(String, PathSignal)> {
        self.entries
            .lock()
            .iter()
            .map(|(key, signal)| (key.clone(), signal.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Drop entries that have no subscribers and no outside handles.
    ///
    /// Returns how many entries were removed.
    pub fn prune(&self) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, signal| signal.handle_count() > 1 || signal.subscriber_count() > 0);
        before - entries.len()
    }
}
