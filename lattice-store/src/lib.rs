//! Lattice Store
//!
//! This crate provides the deep reactive store for the Lattice reactive UI
//! framework. It implements:
//!
//! - Reactive primitives (signals, effects, batching)
//! - A path-addressable state tree with per-path signals
//! - Minimal change notification for nested writes
//! - Middleware, undo/redo history, and debounced persistence
//!
//! # Architecture
//!
//! The crate is organized into two modules:
//!
//! - `reactive`: Core reactive primitives and dependency tracking
//! - `store`: The state tree, its signal registry, and the write path
//!
//! # Example
//!
//! ```rust
//! use lattice_store::{batch, create_store, StoreOptions};
//! use serde_json::json;
//!
//! let (store, set_store) = create_store(json!({"count": 0}), StoreOptions::default());
//!
//! batch(|| {
//!     for _ in 0..3 {
//!         set_store.update("count", |c| json!(c.as_i64().unwrap_or(0) + 1)).unwrap();
//!     }
//! });
//!
//! assert_eq!(store.get("count").map(|f| f.into_value()), Some(json!(3)));
//! ```

pub mod reactive;
pub mod store;

mod error;

pub use error::{PersistError, StoreError};
pub use reactive::batch;
pub use store::{
    create_slice, create_store, create_store_with_actions, create_undoable_store, derive, produce,
    reconcile, Actions, BoundActions, Field, SetStore, Store, StoreOptions, StoreView,
    UndoableStore,
};
