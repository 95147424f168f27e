use kvlog_log::LogError;
use kvlog_types::{Interrupted, ValueId};

/// Errors from value store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No record with this id exists.
    #[error("value not found: {0}")]
    NotFound(ValueId),

    /// The payload does not hash to the id it is stored under.
    #[error("hash mismatch for {id}: payload hashes to {computed}")]
    HashMismatch { id: ValueId, computed: ValueId },

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

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
