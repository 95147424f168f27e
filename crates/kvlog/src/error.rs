use kvlog_history::IndexError;
use kvlog_store::StoreError;
use kvlog_types::{Interrupted, Timestamp, TypeError, ValueId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KvError {
    /// The key has no version matching the query.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// An entry references a value record that does not exist.
    #[error("value not found: {0}")]
    ValueNotFound(ValueId),

    /// A version with this timestamp already exists for the key.
    #[error("duplicate version for key {key} at {timestamp}")]
    DuplicateVersion { key: String, timestamp: Timestamp },

    #[error("invalid key: {0}")]
    InvalidKey(#[from] TypeError),

    #[error("operation cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("store error: {0}")]
    Store(StoreError),

    #[error("index error: {0}")]
    Index(IndexError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl KvError {
    /// Returns `true` for both missing keys and missing value records.
    pub fn is_not_found(&self) -> bool {
        matches!(self, KvError::KeyNotFound(_) | KvError::ValueNotFound(_))
    }

    /// Returns `true` if the caller's context fired.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, KvError::Cancelled | KvError::DeadlineExceeded)
    }
}

impl From<Interrupted> for KvError {
    fn from(e: Interrupted) -> Self {
        match e {
            Interrupted::Cancelled => KvError::Cancelled,
            Interrupted::DeadlineExceeded => KvError::DeadlineExceeded,
        }
    }
}

impl From<StoreError> for KvError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => KvError::ValueNotFound(id),
            StoreError::Interrupted(i) => i.into(),
            other => KvError::Store(other),
        }
    }
}

impl From<IndexError> for KvError {
    fn from(e: IndexError) -> Self {
        match e {
            IndexError::NotFound { key } => KvError::KeyNotFound(key),
            IndexError::DuplicateVersion { key, timestamp } => {
                KvError::DuplicateVersion { key, timestamp }
            }
            IndexError::Interrupted(i) => i.into(),
            other => KvError::Index(other),
        }
    }
}

pub type KvResult<T> = Result<T, KvError>;
