use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

use kvlog_log::{LogConfig, RecordLog};
use kvlog_types::{Context, ValueId, ValueRecord};
use tracing::{info, warn};

use crate::error::{StoreError, StoreResult};
use crate::traits::{verify_record, ValueStore};

/// File-backed value store.
///
/// Records are appended to a [`RecordLog`]; only the `id -> offset` map is
/// kept in memory and payloads are read back from disk on lookup. Every read
/// re-verifies the content hash, so on-disk corruption surfaces as
/// [`StoreError::HashMismatch`] rather than a wrong value.
pub struct FileValueStore {
    log: RecordLog<ValueRecord>,
    offsets: RwLock<HashMap<ValueId, u64>>,
}

impl FileValueStore {
    /// Open (or create) the store at `path`, rebuilding the offset map.
    pub fn open(path: &Path, config: LogConfig) -> StoreResult<Self> {
        let (log, records) = RecordLog::<ValueRecord>::open(path, config)?;

        let mut offsets = HashMap::with_capacity(records.len());
        for record in records {
            if let Err(e) = verify_record(&record.value) {
                warn!(offset = record.offset, error = %e, "skipping corrupt value record");
                continue;
            }
            // Keep the first copy; later duplicates come from racing writers.
            offsets.entry(record.value.id).or_insert(record.offset);
        }

        info!(path = %path.display(), values = offsets.len(), "value store opened");
        Ok(Self {
            log,
            offsets: RwLock::new(offsets),
        })
    }

    /// Number of records currently stored.
    ///
    /// A diagnostic counter: it reads through a poisoned lock, while the
    /// [`ValueStore`] operations report poisoning as a backend error.
    pub fn len(&self) -> usize {
        self.offsets
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Force appended records to disk.
    pub fn sync(&self) -> StoreResult<()> {
        Ok(self.log.sync()?)
    }

    /// Path of the backing log file.
    pub fn path(&self) -> &Path {
        self.log.path()
    }
}

fn poisoned() -> StoreError {
    StoreError::Backend("value store lock poisoned".into())
}

impl ValueStore for FileValueStore {
    fn lookup(&self, ctx: &Context, id: &ValueId) -> StoreResult<Option<ValueRecord>> {
        ctx.check()?;
        let offset = match self.offsets.read().map_err(|_| poisoned())?.get(id) {
            Some(offset) => *offset,
            None => return Ok(None),
        };

        let record = self.log.read_at(offset)?;
        if record.id != *id {
            return Err(StoreError::Backend(format!(
                "record at offset {offset} holds {} instead of {id}",
                record.id
            )));
        }
        verify_record(&record)?;
        Ok(Some(record))
    }

    fn insert(&self, ctx: &Context, record: &ValueRecord) -> StoreResult<bool> {
        ctx.check()?;
        verify_record(record)?;

        // Held across the append so check-and-insert is atomic.
        let mut offsets = self.offsets.write().map_err(|_| poisoned())?;
        if offsets.contains_key(&record.id) {
            return Ok(false);
        }
        let offset = self.log.append(record)?;
        offsets.insert(record.id, offset);
        Ok(true)
    }

    fn contains(&self, ctx: &Context, id: &ValueId) -> StoreResult<bool> {
        ctx.check()?;
        Ok(self
            .offsets
            .read()
            .map_err(|_| poisoned())?
            .contains_key(id))
    }
}

impl std::fmt::Debug for FileValueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileValueStore")
            .field("path", &self.log.path())
            .field("value_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::ContentHasher;

    fn ctx() -> Context {
        Context::background()
    }

    fn open(path: &Path) -> FileValueStore {
        FileValueStore::open(path, LogConfig::default()).unwrap()
    }

    #[test]
    fn put_and_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir.path().join("values.log"));
        let id = store.put(&ctx(), "stored on disk").unwrap();
        assert_eq!(store.get(&ctx(), &id).unwrap(), "stored on disk");
    }

    #[test]
    fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("values.log");
        let id = {
            let store = open(&path);
            let id = store.put(&ctx(), "durable").unwrap();
            store.put(&ctx(), "durable").unwrap();
            id
        };

        let store = open(&path);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&ctx(), &id).unwrap(), "durable");
    }

    #[test]
    fn put_dedups_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir.path().join("values.log"));
        let before = store.put(&ctx(), "once").unwrap();
        let offset_after_first = store.log.offset().unwrap();
        let after = store.put(&ctx(), "  once  ").unwrap();
        assert_eq!(before, after);
        assert_eq!(store.log.offset().unwrap(), offset_after_first);
    }

    #[test]
    fn get_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir.path().join("values.log"));
        let id = ContentHasher::VALUE.hash("absent");
        assert!(matches!(
            store.get(&ctx(), &id),
            Err(StoreError::NotFound(_))
        ));
        assert!(!store.contains(&ctx(), &id).unwrap());
    }

    #[test]
    fn insert_rejects_mismatched_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir.path().join("values.log"));
        let record = ValueRecord {
            id: ContentHasher::VALUE.hash("claimed"),
            payload: "actual".into(),
        };
        assert!(matches!(
            store.insert(&ctx(), &record),
            Err(StoreError::HashMismatch { .. })
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn cancelled_context_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir.path().join("values.log"));
        let ctx = Context::background();
        ctx.cancel();
        assert!(matches!(
            store.put(&ctx, "nope"),
            Err(StoreError::Interrupted(_))
        ));
        assert!(store.is_empty());
    }
}
