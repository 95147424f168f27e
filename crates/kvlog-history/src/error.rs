//! Error types for history index operations.

use kvlog_log::LogError;
use kvlog_types::{Interrupted, Timestamp};
use thiserror::Error;

/// Errors that can occur during history index operations.
#[derive(Debug, Error)]
pub enum IndexError {
    /// The key has no matching history entry.
    #[error("no history for key: {key}")]
    NotFound { key: String },

    /// An entry with this `(key, timestamp)` already exists.
    #[error("duplicate version for key {key} at {timestamp}")]
    DuplicateVersion { key: String, timestamp: Timestamp },

    /// The log holds two entries for one `(key, timestamp)`.
    #[error("history log has a second entry for key {key} at {timestamp} (offset {offset})")]
    ReplayConflict {
        offset: u64,
        key: String,
        timestamp: Timestamp,
    },

    /// Failure in the on-disk record log.
    #[error("log error: {0}")]
    Log(#[from] LogError),

    /// The caller's context was cancelled or expired.
    #[error(transparent)]
    Interrupted(#[from] Interrupted),

    /// Any other backend failure.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Convenience type alias for index operations.
pub type IndexResult<T> = std::result::Result<T, IndexError>;
