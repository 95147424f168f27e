//! In-memory history index for testing and embedding.
//!
//! [`InMemoryHistoryIndex`] keeps one `BTreeMap<Timestamp, ValueRef>` per key
//! behind a `RwLock`, the in-memory analogue of a unique compound index on
//! `(key, timestamp)`.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::ops::Bound;
use std::sync::{Arc, RwLock, RwLockReadGuard};

use kvlog_types::{Context, HistoryEntry, Timestamp, ValueRef};

use crate::cursor::{EntryCursor, HistoryCursor};
use crate::error::{IndexError, IndexResult};
use crate::traits::HistoryIndex;

/// Entries a cursor fetches per round trip unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 64;

type KeyHistory = BTreeMap<Timestamp, ValueRef>;

#[derive(Default)]
struct IndexState {
    keys: HashMap<String, KeyHistory>,
}

/// An in-memory implementation of [`HistoryIndex`].
///
/// Cursors share the index through an `Arc` and fetch in batches; no lock is
/// held between batches, so long iterations never block writers.
pub struct InMemoryHistoryIndex {
    state: Arc<RwLock<IndexState>>,
    batch_size: usize,
}

impl InMemoryHistoryIndex {
    /// Create a new empty index.
    pub fn new() -> Self {
        Self::with_batch_size(DEFAULT_BATCH_SIZE)
    }

    /// Create an index whose cursors fetch `batch_size` entries at a time.
    pub fn with_batch_size(batch_size: usize) -> Self {
        Self {
            state: Arc::new(RwLock::new(IndexState::default())),
            batch_size: batch_size.max(1),
        }
    }

    // The counters below are diagnostics: they read through a poisoned lock,
    // while the `HistoryIndex` operations report poisoning as a backend error.

    fn read_state(&self) -> RwLockReadGuard<'_, IndexState> {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of versions stored for `key`.
    pub fn versions(&self, key: &str) -> usize {
        self.read_state().keys.get(key).map_or(0, BTreeMap::len)
    }

    /// Number of entries across all keys.
    pub fn total_entries(&self) -> usize {
        self.read_state().keys.values().map(BTreeMap::len).sum()
    }

    /// Returns `true` if no entry has been appended.
    pub fn is_empty(&self) -> bool {
        self.total_entries() == 0
    }

    /// All keys with at least one entry, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.read_state().keys.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Returns `true` if an entry exists for `(key, timestamp)`.
    pub fn contains_version(&self, key: &str, timestamp: Timestamp) -> IndexResult<bool> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state
            .keys
            .get(key)
            .is_some_and(|history| history.contains_key(&timestamp)))
    }
}

impl Default for InMemoryHistoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> IndexError {
    IndexError::Backend("history index lock poisoned".into())
}

fn not_found(key: &str) -> IndexError {
    IndexError::NotFound {
        key: key.to_string(),
    }
}

fn to_entry(key: &str, timestamp: &Timestamp, value: &ValueRef) -> HistoryEntry {
    HistoryEntry::new(key, *timestamp, value.clone())
}

impl HistoryIndex for InMemoryHistoryIndex {
    fn append(&self, ctx: &Context, entry: &HistoryEntry) -> IndexResult<()> {
        ctx.check()?;
        let mut state = self.state.write().map_err(|_| poisoned())?;
        let history = state.keys.entry(entry.key.clone()).or_default();
        match history.entry(entry.timestamp) {
            Entry::Occupied(_) => Err(IndexError::DuplicateVersion {
                key: entry.key.clone(),
                timestamp: entry.timestamp,
            }),
            Entry::Vacant(slot) => {
                slot.insert(entry.value.clone());
                Ok(())
            }
        }
    }

    fn latest(&self, ctx: &Context, key: &str) -> IndexResult<HistoryEntry> {
        ctx.check()?;
        let state = self.state.read().map_err(|_| poisoned())?;
        state
            .keys
            .get(key)
            .and_then(BTreeMap::last_key_value)
            .map(|(ts, value)| to_entry(key, ts, value))
            .ok_or_else(|| not_found(key))
    }

    fn after(&self, ctx: &Context, key: &str, timestamp: Timestamp) -> IndexResult<HistoryEntry> {
        ctx.check()?;
        let state = self.state.read().map_err(|_| poisoned())?;
        state
            .keys
            .get(key)
            .and_then(|history| history.range(timestamp..).next())
            .map(|(ts, value)| to_entry(key, ts, value))
            .ok_or_else(|| not_found(key))
    }

    fn iterate(&self, ctx: &Context, key: &str) -> IndexResult<HistoryCursor> {
        ctx.check()?;
        let cursor = MemoryCursor {
            state: Arc::clone(&self.state),
            key: key.to_string(),
            upper: Bound::Unbounded,
            buffer: VecDeque::new(),
            batch_size: self.batch_size,
            exhausted: false,
        };
        Ok(HistoryCursor::new(key, Box::new(cursor)))
    }
}

impl std::fmt::Debug for InMemoryHistoryIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryHistoryIndex")
            .field("entry_count", &self.total_entries())
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

/// Batch-fetching cursor walking one key's history downwards.
struct MemoryCursor {
    state: Arc<RwLock<IndexState>>,
    key: String,
    /// Exclusive upper bound for the next batch.
    upper: Bound<Timestamp>,
    buffer: VecDeque<HistoryEntry>,
    batch_size: usize,
    exhausted: bool,
}

impl MemoryCursor {
    fn fetch_batch(&mut self) -> IndexResult<()> {
        let state = self.state.read().map_err(|_| poisoned())?;
        let Some(history) = state.keys.get(&self.key) else {
            self.exhausted = true;
            return Ok(());
        };

        self.buffer.extend(
            history
                .range((Bound::Unbounded, self.upper))
                .rev()
                .take(self.batch_size)
                .map(|(ts, value)| to_entry(&self.key, ts, value)),
        );

        if self.buffer.len() < self.batch_size {
            self.exhausted = true;
        }
        if let Some(last) = self.buffer.back() {
            self.upper = Bound::Excluded(last.timestamp);
        }
        Ok(())
    }
}

impl EntryCursor for MemoryCursor {
    fn next_entry(&mut self, ctx: &Context) -> IndexResult<Option<HistoryEntry>> {
        if self.buffer.is_empty() && !self.exhausted {
            ctx.check()?;
            self.fetch_batch()?;
        }
        Ok(self.buffer.pop_front())
    }

    fn close(&mut self) -> IndexResult<()> {
        self.buffer.clear();
        self.exhausted = true;
        Ok(())
    }
}
