//! Error types for the store.
//!
//! Writes report structural problems through [`StoreError`]. Persistence
//! failures use [`PersistError`] internally and are logged and swallowed at
//! the store boundary; they never fail a write.

use thiserror::Error;

/// Errors returned by the store's write API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A write tried to descend through a scalar value.
    #[error("cannot write through non-container value at `{path}`")]
    NotAContainer { path: String },

    /// A named key was used where only indices are valid.
    #[error("key `{key}` is not addressable on the sequence at `{path}`")]
    InvalidKey { path: String, key: String },

    /// A sequence length was set to something other than a non-negative integer.
    #[error("invalid length written to `{path}`")]
    InvalidLength { path: String },

    /// A sequence operation was applied to a path that does not hold a sequence.
    #[error("value at `{path}` is not a sequence")]
    NotASequence { path: String },

    /// A sequence operation addressed an element past the end.
    #[error("index {index} out of bounds for sequence of length {len} at `{path}`")]
    IndexOutOfBounds {
        path: String,
        index: usize,
        len: usize,
    },

    /// An action name that was never registered.
    #[error("unknown action `{0}`")]
    UnknownAction(String),
}

/// Errors raised by persistence backends and serializers.
#[derive(Debug, Error)]
pub enum PersistError {
    /// The storage backend rejected the operation.
    #[error("storage error: {0}")]
    Storage(String),

    /// The state could not be encoded.
    #[error("failed to serialize state: {0}")]
    Serialize(#[source] serde_json::Error),

    /// The persisted blob could not be decoded.
    #[error("failed to deserialize state: {0}")]
    Deserialize(#[source] serde_json::Error),
}
