//! Persistence Adapter Glue
//!
//! Loads persisted state once at construction and saves it again, debounced,
//! after writes. Persistence is best-effort: every backend or codec failure is
//! logged and swallowed.
//!
//! # Debouncing
//!
//! Each qualifying write aborts the pending save task and spawns a new one on
//! the ambient tokio runtime, so only the last write in a burst is saved.
//! Without a runtime the save runs synchronously.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{Map, Value};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::access;
use super::path::{self, PathCodec};
use crate::error::PersistError;

/// Default delay between the last write and the save.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

/// Synchronous key/value storage.
pub trait Storage: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, PersistError>;
    fn set_item(&self, key: &str, value: String) -> Result<(), PersistError>;
}

/// Encodes the persisted state.
pub trait Serializer: Send + Sync {
    fn serialize(&self, state: &Value) -> Result<String, PersistError>;
    fn deserialize(&self, raw: &str) -> Result<Value, PersistError>;
}

/// JSON text encoding.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn serialize(&self, state: &Value) -> Result<String, PersistError> {
        serde_json::to_string(state).map_err(PersistError::Serialize)
    }

    fn deserialize(&self, raw: &str) -> Result<Value, PersistError> {
        serde_json::from_str(raw).map_err(PersistError::Deserialize)
    }
}

/// In-process storage. Counts successful writes.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
    writes: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-populated with one item.
    pub fn with_item(key: impl Into<String>, value: impl Into<String>) -> Self {
        let storage = Self::new();
        storage.items.lock().insert(key.into(), value.into());
        storage
    }

    pub fn item(&self, key: &str) -> Option<String> {
        self.items.lock().get(key).cloned()
    }

    /// Number of `set_item` calls so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, PersistError> {
        Ok(self.item(key))
    }

    fn set_item(&self, key: &str, value: String) -> Result<(), PersistError> {
        self.items.lock().insert(key.to_string(), value);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Where and how a store persists itself.
#[derive(Clone)]
pub struct PersistOptions {
    pub key: String,
    /// When set, only these paths are loaded and saved.
    pub paths: Option<Vec<String>>,
    pub debounce: Duration,
    pub storage: Arc<dyn Storage>,
    pub serializer: Arc<dyn Serializer>,
}

impl PersistOptions {
    pub fn new(key: impl Into<String>, storage: Arc<dyn Storage>) -> Self {
        Self {
            key: key.into(),
            paths: None,
            debounce: DEFAULT_DEBOUNCE,
            storage,
            serializer: Arc::new(JsonSerializer),
        }
    }

    pub fn paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.paths = Some(paths.into_iter().map(Into::into).collect());
        self
    }

    pub fn debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn serializer(mut self, serializer: Arc<dyn Serializer>) -> Self {
        self.serializer = serializer;
        self
    }
}

impl fmt::Debug for PersistOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistOptions")
            .field("key", &self.key)
            .field("paths", &self.paths)
            .field("debounce", &self.debounce)
            .finish_non_exhaustive()
    }
}

pub(crate) struct Persistence {
    options: PersistOptions,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Persistence {
    pub fn new(options: PersistOptions) -> Self {
        Self {
            options,
            pending: Mutex::new(None),
        }
    }

    pub fn debounce(&self) -> Duration {
        self.options.debounce
    }

    /// Overlay persisted data onto `initial`.
    ///
    /// With an allow-list only those paths are taken from the persisted blob;
    /// defaults stay for the rest. Unreadable data leaves `initial` untouched.
    pub fn hydrate(&self, mut initial: Value, codec: &PathCodec) -> Value {
        let persisted = match self.load() {
            Ok(Some(persisted)) => persisted,
            Ok(None) => return initial,
            Err(error) => {
                warn!(key = %self.options.key, %error, "ignoring unreadable persisted state");
                return initial;
            }
        };

        match &self.options.paths {
            None => access::merge(&mut initial, persisted),
            Some(paths) => {
                for path in paths {
                    let segments = codec.split(path);
                    if let Some(value) = access::lookup(&persisted, &segments) {
                        if let Err(error) = access::write(&mut initial, &segments, value.clone()) {
                            warn!(path = %path, %error, "skipping persisted path");
                        }
                    }
                }
            }
        }
        debug!(key = %self.options.key, "hydrated persisted state");
        initial
    }

    fn load(&self) -> Result<Option<Value>, PersistError> {
        self.options
            .storage
            .get_item(&self.options.key)?
            .map(|raw| self.options.serializer.deserialize(&raw))
            .transpose()
    }

    /// Whether a write at `path` can change what gets saved.
    pub fn tracks(&self, written: &str) -> bool {
        match &self.options.paths {
            None => true,
            Some(paths) => paths.iter().any(|allowed| path::overlaps(allowed, written)),
        }
    }

    /// The part of `state` that gets saved.
    pub fn select(&self, state: &Value, codec: &PathCodec) -> Value {
        let Some(paths) = &self.options.paths else {
            return state.clone();
        };
        let mut selected = Value::Object(Map::new());
        for path in paths {
            let segments = codec.split(path);
            if let Some(value) = access::lookup(state, &segments) {
                if let Err(error) = access::write(&mut selected, &segments, value.clone()) {
                    warn!(path = %path, %error, "skipping persisted path");
                }
            }
        }
        selected
    }

    /// Serialize and store now. Failures are logged and dropped.
    pub fn save(&self, state: &Value, codec: &PathCodec) {
        let payload = self.select(state, codec);
        let result = self
            .options
            .serializer
            .serialize(&payload)
            .and_then(|raw| self.options.storage.set_item(&self.options.key, raw));
        match result {
            Ok(()) => debug!(key = %self.options.key, "persisted state"),
            Err(error) => warn!(key = %self.options.key, %error, "failed to persist state"),
        }
    }

    /// Replace the pending save task.
    pub fn replace_pending(&self, task: JoinHandle<()>) {
        if let Some(previous) = self.pending.lock().replace(task) {
            previous.abort();
        }
    }

    pub fn cancel_pending(&self) {
        if let Some(previous) = self.pending.lock().take() {
            previous.abort();
        }
    }
}

impl Drop for Persistence {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct FailingStorage;

    impl Storage for FailingStorage {
        fn get_item(&self, _key: &str) -> Result<Option<String>, PersistError> {
            Err(PersistError::Storage("unavailable".into()))
        }

        fn set_item(&self, _key: &str, _value: String) -> Result<(), PersistError> {
            Err(PersistError::Storage("quota exceeded".into()))
        }
    }

    fn persistence(storage: Arc<dyn Storage>, paths: Option<&[&str]>) -> Persistence {
        let mut options = PersistOptions::new("app", storage);
        if let Some(paths) = paths {
            options = options.paths(paths.iter().copied());
        }
        Persistence::new(options)
    }

    #[test]
    fn hydrate_merges_whole_blob() {
        let storage = Arc::new(MemoryStorage::with_item("app", r#"{"user":{"name":"b"}}"#));
        let p = persistence(storage, None);
        let state = p.hydrate(json!({"user": {"name": "a", "age": 3}}), &PathCodec::default());
        assert_eq!(state, json!({"user": {"name": "b", "age": 3}}));
    }

    #[test]
    fn hydrate_with_paths_only_overlays_allowed() {
        let storage = Arc::new(MemoryStorage::with_item(
            "app",
            r#"{"user":{"name":"b","age":99},"theme":"x"}"#,
        ));
        let p = persistence(storage, Some(&["user.name", "missing.path"]));
        let state = p.hydrate(
            json!({"user": {"name": "a", "age": 3}, "theme": "dark"}),
            &PathCodec::default(),
        );
        assert_eq!(state, json!({"user": {"name": "b", "age": 3}, "theme": "dark"}));
    }

    #[test]
    fn hydrate_ignores_malformed_blob() {
        let storage = Arc::new(MemoryStorage::with_item("app", "{not json"));
        let p = persistence(storage, None);
        let state = p.hydrate(json!({"n": 1}), &PathCodec::default());
        assert_eq!(state, json!({"n": 1}));
    }

    #[test]
    fn backend_errors_are_swallowed() {
        let p = persistence(Arc::new(FailingStorage), None);
        let codec = PathCodec::default();
        assert_eq!(p.hydrate(json!({"n": 1}), &codec), json!({"n": 1}));
        p.save(&json!({"n": 2}), &codec);
    }

    #[test]
    fn select_and_tracks_follow_allow_list() {
        let p = persistence(Arc::new(MemoryStorage::new()), Some(&["user.name"]));
        let codec = PathCodec::default();
        let state = json!({"user": {"name": "a", "age": 3}});

        assert_eq!(p.select(&state, &codec), json!({"user": {"name": "a"}}));
        assert!(p.tracks("user.name"));
        assert!(p.tracks("user"));
        assert!(!p.tracks("user.age"));
    }

    #[test]
    fn select_skips_conflicting_paths() {
        // `a.0` builds `a` as an array, so `a.x` no longer fits.
        let p = persistence(Arc::new(MemoryStorage::new()), Some(&["a.0", "a.x"]));
        let state = json!({"a": {"0": 1, "x": 2}});

        assert_eq!(p.select(&state, &PathCodec::default()), json!({"a": [1]}));
    }

    #[test]
    fn save_writes_serialized_payload() {
        let storage = Arc::new(MemoryStorage::new());
        let p = persistence(storage.clone(), None);
        p.save(&json!({"n": 2}), &PathCodec::default());
        assert_eq!(storage.writes(), 1);
        assert_eq!(storage.item("app").as_deref(), Some(r#"{"n":2}"#));
    }
}
