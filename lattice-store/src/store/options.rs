//! Store configuration.
//!
//! [`StoreOptions`] is what a store is built from. [`StoreConfig`] is the
//! plain-data subset of it, deserializable from JSON or TOML, which becomes a
//! `StoreOptions` once a storage backend is supplied.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::middleware::Middleware;
use super::path::DEFAULT_PATH_CACHE_CAPACITY;
use super::persist::{PersistOptions, Storage, DEFAULT_DEBOUNCE};

#[derive(Clone)]
pub struct StoreOptions {
    pub persist: Option<PersistOptions>,
    pub middleware: Vec<Middleware>,
    /// Log every write through `tracing`.
    pub devtools: bool,
    /// Keep undo history of at most this many snapshots.
    pub history_limit: Option<usize>,
    pub path_cache_capacity: usize,
}

impl StoreOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn persist(mut self, persist: PersistOptions) -> Self {
        self.persist = Some(persist);
        self
    }

    pub fn middleware(mut self, middleware: Middleware) -> Self {
        self.middleware.push(middleware);
        self
    }

    pub fn devtools(mut self, enabled: bool) -> Self {
        self.devtools = enabled;
        self
    }

    pub fn history_limit(mut self, limit: usize) -> Self {
        self.history_limit = Some(limit);
        self
    }

    pub fn path_cache_capacity(mut self, capacity: usize) -> Self {
        self.path_cache_capacity = capacity;
        self
    }
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            persist: None,
            middleware: Vec::new(),
            devtools: false,
            history_limit: None,
            path_cache_capacity: DEFAULT_PATH_CACHE_CAPACITY,
        }
    }
}

impl fmt::Debug for StoreOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreOptions")
            .field("persist", &self.persist)
            .field("middleware", &self.middleware.len())
            .field("devtools", &self.devtools)
            .field("history_limit", &self.history_limit)
            .field("path_cache_capacity", &self.path_cache_capacity)
            .finish()
    }
}

/// Serializable store settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub devtools: bool,
    pub history_limit: Option<usize>,
    pub persist: Option<PersistConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistConfig {
    pub key: String,
    #[serde(default)]
    pub paths: Option<Vec<String>>,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE.as_millis() as u64
}

impl StoreConfig {
    /// Build options, using `storage` if persistence is configured.
    pub fn into_options(self, storage: Arc<dyn Storage>) -> StoreOptions {
        let mut options = StoreOptions::new().devtools(self.devtools);
        options.history_limit = self.history_limit;
        if let Some(persist) = self.persist {
            let mut persist_options = PersistOptions::new(persist.key, storage)
                .debounce(Duration::from_millis(persist.debounce_ms));
            persist_options.paths = persist.paths;
            options = options.persist(persist_options);
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::persist::MemoryStorage;

    #[test]
    fn config_deserializes_with_defaults() {
        let config: StoreConfig =
            serde_json::from_str(r#"{"history_limit": 20, "persist": {"key": "app"}}"#).unwrap();
        assert!(!config.devtools);
        assert_eq!(config.history_limit, Some(20));
        let persist = config.persist.clone().unwrap();
        assert_eq!(persist.debounce_ms, 100);
        assert_eq!(persist.paths, None);

        let options = config.into_options(Arc::new(MemoryStorage::new()));
        assert_eq!(options.history_limit, Some(20));
        let persist = options.persist.unwrap();
        assert_eq!(persist.key, "app");
        assert_eq!(persist.debounce, Duration::from_millis(100));
    }

    #[test]
    fn empty_config_is_default() {
        let config: StoreConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, StoreConfig::default());
    }
}
