//! Reactive Primitives
//!
//! This module implements the signal primitive the store is built on:
//! signals, effects, and batching.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! within a tracking context (such as an effect), the signal automatically
//! registers that context as a dependent. When the signal's value changes, all
//! dependents are notified.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change. Store consumers are effects: they read paths and
//! re-run when those paths change.
//!
//! ## Batches
//!
//! A batch is a scope in which any number of writes produce one coalesced
//! wave of notifications, delivered when the outermost batch exits.
//!
//! # Implementation Notes
//!
//! The reactive system uses a thread-local tracking context to automatically
//! detect dependencies. When a signal is read, we check if there is an active
//! tracking context and, if so, register the dependency.

mod context;
mod effect;
mod runtime;
mod signal;
mod subscriber;

pub use context::{untrack, ReactiveContext};
pub use effect::Effect;
pub use runtime::{batch, Reactive, Runtime, Source};
pub use signal::Signal;
pub use subscriber::{Subscriber, SubscriberId};
