//! The [`HistoryIndex`] trait defining the history storage interface.
//!
//! Any backend (in-memory, file, database) implements this trait to provide
//! versioned entries to the kvlog read and write paths.

use kvlog_types::{Context, HistoryEntry, Timestamp};

use crate::cursor::HistoryCursor;
use crate::error::IndexResult;

/// Storage backend for history entries.
///
/// Implementations must be thread-safe (`Send + Sync`) and enforce
/// uniqueness of `(key, timestamp)` atomically with the insert: two racing
/// appends of the same pair must see exactly one succeed.
pub trait HistoryIndex: Send + Sync {
    /// Insert a new entry.
    ///
    /// Fails with [`IndexError::DuplicateVersion`] if an entry with the same
    /// key and timestamp exists. Never overwrites.
    ///
    /// [`IndexError::DuplicateVersion`]: crate::IndexError::DuplicateVersion
    fn append(&self, ctx: &Context, entry: &HistoryEntry) -> IndexResult<()>;

    /// The entry with the greatest timestamp for `key`.
    ///
    /// Fails with [`IndexError::NotFound`](crate::IndexError::NotFound) if
    /// the key has no history.
    fn latest(&self, ctx: &Context, key: &str) -> IndexResult<HistoryEntry>;

    /// The entry with the smallest timestamp `>= timestamp` for `key`.
    ///
    /// Fails with [`IndexError::NotFound`](crate::IndexError::NotFound) if
    /// no such entry exists.
    fn after(&self, ctx: &Context, key: &str, timestamp: Timestamp) -> IndexResult<HistoryEntry>;

    /// Open a cursor over all entries for `key`, newest first.
    ///
    /// Each call starts a fresh, independent cursor. A key without history
    /// yields an empty cursor, not an error.
    fn iterate(&self, ctx: &Context, key: &str) -> IndexResult<HistoryCursor>;
}
