use std::sync::Arc;

use kvlog_history::{FileHistoryIndex, HistoryIndex, IndexError, InMemoryHistoryIndex};
use kvlog_log::LogConfig;
use kvlog_store::{
    normalize, ContentHasher, FileValueStore, InMemoryValueStore, StoreError, ValueStore,
};
use kvlog_types::{validate_key, Context, HistoryEntry, Timestamp, ValueRef};
use tracing::{debug, error, info};

use crate::clock::{Clock, MonotonicClock};
use crate::config::{KvConfig, StorageConfig};
use crate::error::{KvError, KvResult};
use crate::history::{History, Version};

/// File name of the history index inside a storage directory.
pub const HISTORY_FILE: &str = "history.log";
/// File name of the value store inside a storage directory.
pub const VALUES_FILE: &str = "values.log";

/// Result of a [`KvLog::set`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SetOutcome {
    /// A new version was appended.
    Appended(HistoryEntry),
    /// The value equals the current one; nothing was written.
    Unchanged,
}

impl SetOutcome {
    pub fn is_appended(&self) -> bool {
        matches!(self, SetOutcome::Appended(_))
    }

    /// The appended entry, if any.
    pub fn entry(&self) -> Option<&HistoryEntry> {
        match self {
            SetOutcome::Appended(entry) => Some(entry),
            SetOutcome::Unchanged => None,
        }
    }
}

/// A time-versioned key-value store.
///
/// Combines a [`HistoryIndex`] of `(key, timestamp, value)` entries with a
/// content-addressed [`ValueStore`] for values too large to inline. Both
/// backends are shared (`Arc`) and owned by the caller; `KvLog` holds no
/// state of its own between calls.
pub struct KvLog {
    values: Arc<dyn ValueStore>,
    history: Arc<dyn HistoryIndex>,
    clock: Arc<dyn Clock>,
    config: KvConfig,
}

impl KvLog {
    /// Build a store over existing backends with the default configuration.
    pub fn new(values: Arc<dyn ValueStore>, history: Arc<dyn HistoryIndex>) -> Self {
        Self {
            values,
            history,
            clock: Arc::new(MonotonicClock::new()),
            config: KvConfig::default(),
        }
    }

    /// A store backed entirely by memory.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryValueStore::new()),
            Arc::new(InMemoryHistoryIndex::new()),
        )
    }

    /// Build the backends described by `config` and open a store over them.
    ///
    /// For [`StorageConfig::File`], the history index and value store live in
    /// `history.log` and `values.log` under the configured directory, which
    /// is created if missing.
    pub fn open(config: &KvConfig) -> KvResult<Self> {
        config.validate()?;
        let (values, history): (Arc<dyn ValueStore>, Arc<dyn HistoryIndex>) =
            match &config.storage {
                StorageConfig::Memory => (
                    Arc::new(InMemoryValueStore::new()),
                    Arc::new(InMemoryHistoryIndex::with_batch_size(
                        config.cursor_batch_size,
                    )),
                ),
                StorageConfig::File { dir, sync_mode } => {
                    std::fs::create_dir_all(dir)?;
                    let log_config = LogConfig {
                        sync_mode: *sync_mode,
                    };
                    let values = FileValueStore::open(&dir.join(VALUES_FILE), log_config.clone())?;
                    let history = FileHistoryIndex::open(
                        &dir.join(HISTORY_FILE),
                        log_config,
                        config.cursor_batch_size,
                    )?;
                    info!(
                        dir = %dir.display(),
                        values = values.len(),
                        entries = history.total_entries(),
                        "kvlog opened"
                    );
                    (Arc::new(values), Arc::new(history))
                }
            };

        Ok(Self::new(values, history).with_config(config.clone()))
    }

    /// Replace the configuration.
    ///
    /// Only `inline_threshold` affects an already-built store; batch size and
    /// storage are consumed by [`KvLog::open`].
    pub fn with_config(mut self, config: KvConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the clock that stamps new versions.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &KvConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Write path
    // -----------------------------------------------------------------------

    /// Make `value` (trimmed) the current value of `key`.
    ///
    /// Appends nothing if the value equals the current one. Values longer
    /// than the inline threshold are written to the value store before the
    /// history entry that references them, so a reader never observes an
    /// entry whose value is missing. A failed append can leave an
    /// unreferenced value record behind.
    ///
    /// Fails with [`KvError::DuplicateVersion`] if the key already has a
    /// version at the clock's current reading.
    pub fn set(&self, ctx: &Context, key: &str, value: &str) -> KvResult<SetOutcome> {
        validate_key(key)?;
        ctx.check()?;

        let value = normalize(value);
        let candidate = if value.len() > self.config.inline_threshold {
            ValueRef::Stored(ContentHasher::VALUE.hash(value))
        } else {
            ValueRef::Inline(value.to_string())
        };

        match self.history.latest(ctx, key) {
            Ok(latest) if latest.value == candidate => {
                debug!(key = %key, timestamp = %latest.timestamp, "value unchanged, skipping append");
                return Ok(SetOutcome::Unchanged);
            }
            Ok(_) | Err(IndexError::NotFound { .. }) => {}
            Err(e) => return Err(e.into()),
        }

        if let Some(id) = candidate.value_id() {
            let stored = self.values.put(ctx, value)?;
            debug_assert_eq!(stored, *id);
        }

        ctx.check()?;
        let entry = HistoryEntry::new(key, self.clock.now(), candidate);
        self.history.append(ctx, &entry)?;
        debug!(
            key = %key,
            timestamp = %entry.timestamp,
            inline = entry.value.is_inline(),
            "version appended"
        );
        Ok(SetOutcome::Appended(entry))
    }

    // -----------------------------------------------------------------------
    // Read path
    // -----------------------------------------------------------------------

    /// The current value of `key`.
    pub fn get(&self, ctx: &Context, key: &str) -> KvResult<String> {
        Ok(self.latest_version(ctx, key)?.value)
    }

    /// The value of the first version of `key` at or after `at`.
    pub fn get_at(&self, ctx: &Context, key: &str, at: Timestamp) -> KvResult<String> {
        validate_key(key)?;
        ctx.check()?;
        let entry = self.history.after(ctx, key, at)?;
        resolve(ctx, self.values.as_ref(), key, &entry.value)
    }

    /// The current version of `key`, with the instant it became current.
    pub fn latest_version(&self, ctx: &Context, key: &str) -> KvResult<Version> {
        validate_key(key)?;
        ctx.check()?;
        let entry = self.history.latest(ctx, key)?;
        let value = resolve(ctx, self.values.as_ref(), key, &entry.value)?;
        Ok(Version {
            timestamp: entry.timestamp,
            value,
        })
    }

    /// All versions of `key`, newest first.
    ///
    /// An unknown key yields an empty iterator. The iterator keeps a clone of
    /// `ctx` and checks it before every step.
    pub fn history(&self, ctx: &Context, key: &str) -> KvResult<History> {
        validate_key(key)?;
        ctx.check()?;
        let cursor = self.history.iterate(ctx, key)?;
        Ok(History::new(ctx.clone(), cursor, Arc::clone(&self.values)))
    }
}

impl std::fmt::Debug for KvLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvLog")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Turn a [`ValueRef`] into its payload.
///
/// A reference to a missing value record means the backends disagree; it is
/// reported as [`KvError::ValueNotFound`] and logged, never papered over.
pub(crate) fn resolve(
    ctx: &Context,
    values: &dyn ValueStore,
    key: &str,
    value: &ValueRef,
) -> KvResult<String> {
    match value {
        ValueRef::Inline(value) => Ok(value.clone()),
        ValueRef::Stored(id) => values.get(ctx, id).map_err(|e| {
            if let StoreError::NotFound(id) = &e {
                error!(key = %key, id = %id, "history entry references missing value");
            }
            KvError::from(e)
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    use crate::clock::ManualClock;
    use crate::config::DEFAULT_INLINE_THRESHOLD;
    use kvlog_types::ValueId;
    use proptest::prelude::*;

    fn ctx() -> Context {
        Context::background()
    }

    fn long(fill: char) -> String {
        fill.to_string().repeat(DEFAULT_INLINE_THRESHOLD + 100)
    }

    struct Fixture {
        db: KvLog,
        values: Arc<InMemoryValueStore>,
        history: Arc<InMemoryHistoryIndex>,
    }

    fn fixture() -> Fixture {
        let values = Arc::new(InMemoryValueStore::new());
        let history = Arc::new(InMemoryHistoryIndex::with_batch_size(2));
        let db = KvLog::new(values.clone(), history.clone())
            .with_clock(Arc::new(ManualClock::with_step(
                Timestamp::from_nanos(1_000),
                Duration::from_nanos(10),
            )));
        Fixture {
            db,
            values,
            history,
        }
    }

    fn collect(db: &KvLog, key: &str) -> Vec<String> {
        db.history(&ctx(), key)
            .unwrap()
            .map(|v| v.unwrap().value)
            .collect()
    }

    // -----------------------------------------------------------------------
    // Write path
    // -----------------------------------------------------------------------

    #[test]
    fn set_twice_appends_once() {
        let f = fixture();
        assert!(f.db.set(&ctx(), "foo", "bar").unwrap().is_appended());
        assert_eq!(f.db.set(&ctx(), "foo", "bar").unwrap(), SetOutcome::Unchanged);
        assert_eq!(f.history.versions("foo"), 1);
    }

    #[test]
    fn whitespace_only_difference_is_unchanged() {
        let f = fixture();
        f.db.set(&ctx(), "foo", "bar").unwrap();
        assert_eq!(f.db.set(&ctx(), "foo", "  bar\n").unwrap(), SetOutcome::Unchanged);
    }

    #[test]
    fn reverting_to_an_older_value_appends() {
        let f = fixture();
        f.db.set(&ctx(), "foo", "a").unwrap();
        f.db.set(&ctx(), "foo", "b").unwrap();
        assert!(f.db.set(&ctx(), "foo", "a").unwrap().is_appended());
        assert_eq!(collect(&f.db, "foo"), vec!["a", "b", "a"]);
    }

    #[test]
    fn appended_entry_is_stamped_by_clock() {
        let f = fixture();
        let outcome = f.db.set(&ctx(), "foo", "bar").unwrap();
        let entry = outcome.entry().unwrap();
        assert_eq!(entry.key, "foo");
        assert_eq!(entry.timestamp, Timestamp::from_nanos(1_000));
        assert_eq!(entry.value, ValueRef::Inline("bar".into()));
    }

    #[test]
    fn inline_threshold_boundary() {
        let f = fixture();
        let at_threshold = "x".repeat(DEFAULT_INLINE_THRESHOLD);
        let over = "y".repeat(DEFAULT_INLINE_THRESHOLD + 1);

        let entry = f.db.set(&ctx(), "a", &at_threshold).unwrap();
        assert!(entry.entry().unwrap().value.is_inline());
        assert!(f.values.is_empty());

        let entry = f.db.set(&ctx(), "b", &over).unwrap();
        let id = *entry.entry().unwrap().value.value_id().unwrap();
        assert_eq!(id, ContentHasher::VALUE.hash(&over));
        assert_eq!(f.values.len(), 1);
    }

    #[test]
    fn threshold_applies_to_trimmed_length() {
        let f = fixture();
        let padded = format!("   {}   ", "z".repeat(DEFAULT_INLINE_THRESHOLD));
        let outcome = f.db.set(&ctx(), "k", &padded).unwrap();
        assert!(outcome.entry().unwrap().value.is_inline());
    }

    #[test]
    fn configured_threshold_is_used() {
        let f = fixture();
        let db = f.db.with_config(KvConfig {
            inline_threshold: 4,
            ..KvConfig::default()
        });
        db.set(&ctx(), "k", "12345").unwrap();
        assert_eq!(f.values.len(), 1);
        assert_eq!(db.get(&ctx(), "k").unwrap(), "12345");
    }

    #[test]
    fn long_value_is_stored_once_across_keys() {
        let f = fixture();
        let payload = long('p');
        f.db.set(&ctx(), "one", &payload).unwrap();
        f.db.set(&ctx(), "two", &payload).unwrap();

        assert_eq!(f.values.len(), 1);
        let first = f.history.latest(&ctx(), "one").unwrap();
        let second = f.history.latest(&ctx(), "two").unwrap();
        assert_eq!(first.value, second.value);
        assert!(!first.value.is_inline());
    }

    #[test]
    fn repeated_long_value_is_unchanged() {
        let f = fixture();
        let payload = long('q');
        f.db.set(&ctx(), "k", &payload).unwrap();
        assert_eq!(f.db.set(&ctx(), "k", &payload).unwrap(), SetOutcome::Unchanged);
        assert_eq!(f.history.versions("k"), 1);
    }

    #[test]
    fn repeated_timestamp_is_duplicate_version() {
        let f = fixture();
        let db = f
            .db
            .with_clock(Arc::new(ManualClock::frozen(Timestamp::from_nanos(42))));
        db.set(&ctx(), "k", "a").unwrap();
        let err = db.set(&ctx(), "k", "b").unwrap_err();
        assert!(matches!(
            err,
            KvError::DuplicateVersion { ref key, timestamp }
                if key == "k" && timestamp == Timestamp::from_nanos(42)
        ));
        assert_eq!(db.get(&ctx(), "k").unwrap(), "a");

        // Other keys are unaffected by the same timestamp.
        db.set(&ctx(), "other", "b").unwrap();
    }

    #[test]
    fn empty_key_is_rejected() {
        let f = fixture();
        assert!(matches!(f.db.set(&ctx(), "", "v"), Err(KvError::InvalidKey(_))));
        assert!(matches!(f.db.get(&ctx(), ""), Err(KvError::InvalidKey(_))));
        assert!(f.history.is_empty());
    }

    #[test]
    fn cancelled_set_writes_nothing() {
        let f = fixture();
        let cancelled = ctx();
        cancelled.cancel();
        assert!(matches!(
            f.db.set(&cancelled, "k", &long('c')),
            Err(KvError::Cancelled)
        ));
        assert!(f.values.is_empty());
        assert!(f.history.is_empty());
    }

    #[test]
    fn expired_deadline_aborts_reads() {
        let f = fixture();
        f.db.set(&ctx(), "k", "v").unwrap();
        let expired = Context::with_deadline(Instant::now() - Duration::from_millis(1));
        assert!(matches!(f.db.get(&expired, "k"), Err(KvError::DeadlineExceeded)));
        assert!(matches!(
            f.db.get_at(&expired, "k", Timestamp::MIN),
            Err(KvError::DeadlineExceeded)
        ));
        assert!(matches!(f.db.history(&expired, "k"), Err(KvError::DeadlineExceeded)));
    }

    // -----------------------------------------------------------------------
    // Read path
    // -----------------------------------------------------------------------

    #[test]
    fn get_returns_latest() {
        let f = fixture();
        f.db.set(&ctx(), "foo", "v1").unwrap();
        f.db.set(&ctx(), "foo", "v2").unwrap();
        assert_eq!(f.db.get(&ctx(), "foo").unwrap(), "v2");
    }

    #[test]
    fn get_at_before_first_write_returns_first() {
        let f = fixture();
        let t0 = Timestamp::from_nanos(0);
        for v in ["v1", "v2", "v3"] {
            f.db.set(&ctx(), "foo", v).unwrap();
        }
        assert_eq!(f.db.get_at(&ctx(), "foo", t0).unwrap(), "v1");
    }

    #[test]
    fn get_at_with_wall_clock() {
        let db = KvLog::in_memory();
        let t0 = Timestamp::now();
        for v in ["v1", "v2", "v3"] {
            db.set(&ctx(), "foo", v).unwrap();
        }
        assert_eq!(db.get_at(&ctx(), "foo", t0).unwrap(), "v1");
    }

    #[test]
    fn get_at_exact_and_between_timestamps() {
        let f = fixture();
        // Clock yields 1000, 1010, 1020.
        for v in ["v1", "v2", "v3"] {
            f.db.set(&ctx(), "foo", v).unwrap();
        }
        let at = |n| f.db.get_at(&ctx(), "foo", Timestamp::from_nanos(n));
        assert_eq!(at(1_010).unwrap(), "v2");
        assert_eq!(at(1_011).unwrap(), "v3");
        assert!(matches!(at(1_021), Err(KvError::KeyNotFound(_))));
    }

    #[test]
    fn missing_key_is_not_found() {
        let f = fixture();
        let err = f.db.get(&ctx(), "nope").unwrap_err();
        assert!(matches!(err, KvError::KeyNotFound(ref k) if k == "nope"));
        assert!(err.is_not_found());
        assert!(f
            .db
            .get_at(&ctx(), "nope", Timestamp::MIN)
            .unwrap_err()
            .is_not_found());
        assert!(f.db.latest_version(&ctx(), "nope").unwrap_err().is_not_found());
    }

    #[test]
    fn missing_key_history_is_empty() {
        let f = fixture();
        assert_eq!(f.db.history(&ctx(), "nope").unwrap().count(), 0);
    }

    #[test]
    fn history_is_newest_first() {
        let f = fixture();
        let values: Vec<String> = (1..=7).map(|i| format!("v{i}")).collect();
        for v in &values {
            f.db.set(&ctx(), "foo", v).unwrap();
        }
        let expected: Vec<String> = values.into_iter().rev().collect();
        assert_eq!(collect(&f.db, "foo"), expected);
    }

    #[test]
    fn history_resolves_stored_values() {
        let f = fixture();
        let big = long('b');
        f.db.set(&ctx(), "k", "small").unwrap();
        f.db.set(&ctx(), "k", &big).unwrap();
        assert_eq!(collect(&f.db, "k"), vec![big, "small".to_string()]);
    }

    #[test]
    fn history_is_restartable() {
        let f = fixture();
        f.db.set(&ctx(), "k", "a").unwrap();
        f.db.set(&ctx(), "k", "b").unwrap();
        assert_eq!(collect(&f.db, "k"), collect(&f.db, "k"));
    }

    #[test]
    fn latest_version_carries_timestamp() {
        let f = fixture();
        f.db.set(&ctx(), "k", "a").unwrap();
        f.db.set(&ctx(), "k", "b").unwrap();
        let version = f.db.latest_version(&ctx(), "k").unwrap();
        assert_eq!(version.timestamp, Timestamp::from_nanos(1_010));
        assert_eq!(version.value, "b");
    }

    #[test]
    fn missing_value_record_is_surfaced() {
        let f = fixture();
        let missing = ValueId::from_hash([7; 32]);
        f.history
            .append(
                &ctx(),
                &HistoryEntry::new("k", Timestamp::from_nanos(1), ValueRef::Stored(missing)),
            )
            .unwrap();

        let err = f.db.get(&ctx(), "k").unwrap_err();
        assert!(matches!(err, KvError::ValueNotFound(id) if id == missing));
        let mut history = f.db.history(&ctx(), "k").unwrap();
        assert!(matches!(history.next(), Some(Err(KvError::ValueNotFound(_)))));
        assert!(history.next().is_none());
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = KvConfig::file(dir.path().join("data"));
        let big = long('f');
        {
            let db = KvLog::open(&config).unwrap();
            db.set(&ctx(), "k", "first").unwrap();
            db.set(&ctx(), "k", &big).unwrap();
            db.set(&ctx(), "other", &big).unwrap();
        }

        assert!(dir.path().join("data").join(HISTORY_FILE).exists());
        assert!(dir.path().join("data").join(VALUES_FILE).exists());

        let db = KvLog::open(&config).unwrap();
        assert_eq!(db.get(&ctx(), "k").unwrap(), big);
        assert_eq!(db.get(&ctx(), "other").unwrap(), big);
        assert_eq!(collect(&db, "k"), vec![big.clone(), "first".to_string()]);
        assert_eq!(db.set(&ctx(), "k", &big).unwrap(), SetOutcome::Unchanged);
    }

    #[test]
    fn data_dir_has_a_single_owner() {
        let dir = tempfile::tempdir().unwrap();
        let config = KvConfig::file(dir.path().join("data"));
        let db = KvLog::open(&config).unwrap();
        db.set(&ctx(), "k", "v").unwrap();

        assert!(matches!(KvLog::open(&config), Err(KvError::Store(_))));

        drop(db);
        let db = KvLog::open(&config).unwrap();
        assert_eq!(db.get(&ctx(), "k").unwrap(), "v");
    }

    #[test]
    fn open_rejects_invalid_config() {
        let config = KvConfig {
            cursor_batch_size: 0,
            ..KvConfig::default()
        };
        assert!(matches!(KvLog::open(&config), Err(KvError::Config(_))));
    }

    #[test]
    fn open_memory_config() {
        let db = KvLog::open(&KvConfig::default()).unwrap();
        db.set(&ctx(), "k", "v").unwrap();
        assert_eq!(db.get(&ctx(), "k").unwrap(), "v");
    }

    // -----------------------------------------------------------------------
    // Properties
    // -----------------------------------------------------------------------

    proptest! {
        #[test]
        fn set_then_get_returns_trimmed(value in "\\s{0,3}[a-z0-9 ]{0,400}\\s{0,3}") {
            let db = KvLog::in_memory();
            db.set(&ctx(), "k", &value).unwrap();
            prop_assert_eq!(db.get(&ctx(), "k").unwrap(), value.trim());
        }

        #[test]
        fn history_length_counts_changes(values in proptest::collection::vec("[ab]", 1..20)) {
            let f = fixture();
            for v in &values {
                f.db.set(&ctx(), "k", v).unwrap();
            }
            let changes = 1 + values.windows(2).filter(|w| w[0] != w[1]).count();
            prop_assert_eq!(f.db.history(&ctx(), "k").unwrap().count(), changes);
        }
    }
}
