use std::path::PathBuf;

use kvfs_types::{ObjectId, StoreKey, TypeError};

/// Errors from key-value store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A directory entry references a record the store does not hold.
    #[error("metadata record not found: {0}")]
    MissingRecord(StoreKey),

    /// A record claims content but no blob is stored under its key.
    #[error("content blob not found: {0}")]
    MissingContent(ObjectId),

    /// A stored record or blob failed to decode.
    #[error("corrupt value under {key}: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: TypeError,
    },

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Key too long for the log framing.
    #[error("key of {0} bytes exceeds the maximum key length")]
    KeyTooLong(usize),

    /// Value too long for the log framing.
    #[error("value of {0} bytes exceeds the maximum value length")]
    ValueTooLong(usize),

    /// The log file could not be opened at the given path.
    #[error("cannot open log at {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A failed append left bytes in the log that could not be cut off.
    /// Appends are refused until the log is compacted or reopened.
    #[error("durable log at {0} holds a partial frame")]
    Wedged(PathBuf),

    /// An internal lock was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    LockPoisoned,
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
