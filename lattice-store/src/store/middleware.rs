//! Middleware Pipeline
//!
//! Middleware observe every committed write, synchronously and in
//! registration order, after the state tree has been updated and before any
//! signal is refreshed.
//!
//! A middleware must not write to the store it observes. The state lock is
//! held for reading while the pipeline runs, so a write from inside a
//! middleware deadlocks.

use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

/// One committed write, as seen by middleware.
#[derive(Debug, Clone, Copy)]
pub struct WriteEvent<'a> {
    /// The whole state tree after the write.
    pub state: &'a Value,
    /// Canonical path that was written.
    pub path: &'a str,
    /// New value at `path`; `None` when the path was removed.
    pub value: Option<&'a Value>,
    /// Value at `path` before the write; `None` when it did not exist.
    pub previous: Option<&'a Value>,
}

/// A write observer.
pub type Middleware = Arc<dyn Fn(&WriteEvent<'_>) + Send + Sync>;

/// Wrap a closure as [`Middleware`].
pub fn middleware<F>(f: F) -> Middleware
where
    F: Fn(&WriteEvent<'_>) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Middleware that logs each write as a `tracing` debug event.
pub fn devtools() -> Middleware {
    middleware(|event| {
        debug!(
            target: "lattice_store::devtools",
            path = event.path,
            value = ?event.value,
            previous = ?event.previous,
            "store write"
        );
    })
}

#[derive(Default)]
pub(crate) struct Pipeline {
    stages: RwLock<Vec<Middleware>>,
}

impl Pipeline {
    pub fn new(stages: Vec<Middleware>) -> Self {
        Self {
            stages: RwLock::new(stages),
        }
    }

    pub fn push(&self, stage: Middleware) {
        self.stages.write().push(stage);
    }

    pub fn len(&self) -> usize {
        self.stages.read().len()
    }

    pub fn run(&self, event: &WriteEvent<'_>) {
        // Snapshot the list so a stage may register further middleware.
        let stages = self.stages.read().clone();
        for stage in &stages {
            stage(event);
        }
    }
}
