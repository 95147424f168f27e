//! File-backed history index.

use std::path::Path;
use std::sync::Mutex;

use kvlog_log::{LogConfig, RecordLog};
use kvlog_types::{Context, HistoryEntry, Timestamp};
use tracing::{debug, error, info};

use crate::cursor::HistoryCursor;
use crate::error::{IndexError, IndexResult};
use crate::memory::InMemoryHistoryIndex;
use crate::traits::HistoryIndex;

/// History index persisted to an append-only [`RecordLog`].
///
/// The log is the source of truth; the ordered `(key, timestamp)` index is
/// rebuilt in memory when the file is opened and answers all queries.
/// Appends are serialized so that the uniqueness check, the durable write,
/// and the index update happen as one step.
pub struct FileHistoryIndex {
    log: RecordLog<HistoryEntry>,
    index: InMemoryHistoryIndex,
    append_lock: Mutex<()>,
}

impl FileHistoryIndex {
    /// Open (or create) the index at `path` and replay its entries.
    ///
    /// The underlying log is locked for the lifetime of the index, so a
    /// second open of the same path fails with [`LogError::Locked`]. A log
    /// holding two entries for one `(key, timestamp)` fails with
    /// [`IndexError::ReplayConflict`].
    ///
    /// [`LogError::Locked`]: kvlog_log::LogError::Locked
    pub fn open(path: &Path, config: LogConfig, batch_size: usize) -> IndexResult<Self> {
        let (log, records) = RecordLog::<HistoryEntry>::open(path, config)?;
        let index = InMemoryHistoryIndex::with_batch_size(batch_size);

        let replay = Context::background();
        for record in records {
            match index.append(&replay, &record.value) {
                Ok(()) => {}
                Err(IndexError::DuplicateVersion { key, timestamp }) => {
                    error!(offset = record.offset, key = %key, timestamp = %timestamp, "duplicate history entry in log");
                    return Err(IndexError::ReplayConflict {
                        offset: record.offset,
                        key,
                        timestamp,
                    });
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            path = %path.display(),
            entries = index.total_entries(),
            "history index opened"
        );
        Ok(Self {
            log,
            index,
            append_lock: Mutex::new(()),
        })
    }

    /// Number of versions stored for `key`.
    pub fn versions(&self, key: &str) -> usize {
        self.index.versions(key)
    }

    /// Number of entries across all keys.
    pub fn total_entries(&self) -> usize {
        self.index.total_entries()
    }

    /// All keys with at least one entry, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.index.keys()
    }

    /// Force appended entries to disk.
    pub fn sync(&self) -> IndexResult<()> {
        Ok(self.log.sync()?)
    }

    /// Path of the backing log file.
    pub fn path(&self) -> &Path {
        self.log.path()
    }
}

impl HistoryIndex for FileHistoryIndex {
    fn append(&self, ctx: &Context, entry: &HistoryEntry) -> IndexResult<()> {
        ctx.check()?;
        let _guard = self
            .append_lock
            .lock()
            .map_err(|_| IndexError::Backend("history append lock poisoned".into()))?;

        if self.index.contains_version(&entry.key, entry.timestamp)? {
            return Err(IndexError::DuplicateVersion {
                key: entry.key.clone(),
                timestamp: entry.timestamp,
            });
        }

        ctx.check()?;
        let offset = self.log.append(entry)?;
        // Once durable, the entry must become visible regardless of the
        // caller's context.
        self.index.append(&Context::background(), entry)?;

        debug!(key = %entry.key, timestamp = %entry.timestamp, offset, "history entry persisted");
        Ok(())
    }

    fn latest(&self, ctx: &Context, key: &str) -> IndexResult<HistoryEntry> {
        self.index.latest(ctx, key)
    }

    fn after(&self, ctx: &Context, key: &str, timestamp: Timestamp) -> IndexResult<HistoryEntry> {
        self.index.after(ctx, key, timestamp)
    }

    fn iterate(&self, ctx: &Context, key: &str) -> IndexResult<HistoryCursor> {
        self.index.iterate(ctx, key)
    }
}

impl std::fmt::Debug for FileHistoryIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileHistoryIndex")
            .field("path", &self.log.path())
            .field("entry_count", &self.total_entries())
            .finish()
    }
}
