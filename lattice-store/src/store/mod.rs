//! Deep Reactive Store
//!
//! A path-addressable state container with fine-grained change tracking.
//! Reads register dependencies on the exact paths they touch; writes notify
//! only the signals whose value can have changed.
//!
//! # Layers
//!
//! - `path`: canonical path strings and the per-store segment cache
//! - `access`: plain reads and writes on the state tree
//! - `registry`: path to signal map, created lazily on read
//! - `view`: tracked handles over nested values, plus the sequence API
//! - `engine`: the write path and the notification pass
//! - `middleware`, `history`, `persist`: layers hooked into the write path
//! - `api`, `helpers`: public constructors and derived helpers
//!
//! # Example
//!
//! ```rust
//! use lattice_store::create_store;
//! use lattice_store::reactive::Effect;
//! use serde_json::json;
//!
//! let (store, set_store) = create_store(json!({"todos": []}), Default::default());
//!
//! let todos = store.scope("todos");
//! let effect = Effect::new(move || {
//!     let _ = todos.len();
//! });
//!
//! set_store.update("todos", |t| {
//!     let mut items = t.as_array().cloned().unwrap_or_default();
//!     items.push(json!({"id": 1, "text": "a"}));
//!     json!(items)
//! }).unwrap();
//! assert_eq!(effect.run_count(), 2);
//! ```

mod access;
mod api;
mod engine;
mod helpers;
mod history;
mod middleware;
mod options;
mod path;
mod persist;
mod registry;
mod view;

pub use api::{
    create_slice, create_store, create_store_with_actions, create_undoable_store, Action, Actions,
    BoundActions, SetStore, SliceSetter, UndoableStore,
};
pub use engine::Store;
pub use helpers::{derive, produce, reconcile};
pub use history::{History, HistoryMode, Snapshot, DEFAULT_HISTORY_LIMIT};
pub use middleware::{devtools, middleware, Middleware, WriteEvent};
pub use options::{PersistConfig, StoreConfig, StoreOptions};
pub use path::{PathCodec, Segment, Segments, DEFAULT_PATH_CACHE_CAPACITY};
pub use persist::{JsonSerializer, MemoryStorage, PersistOptions, Serializer, Storage, DEFAULT_DEBOUNCE};
pub use registry::PathSignal;
pub use view::{Field, StoreView};
