//! Time-versioned key-value store.
//!
//! Each key maps to an ordered history of values, each stamped with the
//! instant it became current. [`KvLog`] fetches the current value, the value
//! current at or after a past instant, or walks a key's history newest-first.
//!
//! Writes are deduplicated twice: a `set` that repeats the current value
//! appends nothing, and values longer than the inline threshold are stored
//! once in a content-addressed value store no matter how many keys or
//! versions refer to them.
//!
//! ```
//! use kvlog::{Context, KvLog};
//!
//! let db = KvLog::in_memory();
//! let ctx = Context::background();
//! db.set(&ctx, "greeting", "hello").unwrap();
//! db.set(&ctx, "greeting", "hello").unwrap(); // no new version
//! db.set(&ctx, "greeting", "goodbye").unwrap();
//! assert_eq!(db.get(&ctx, "greeting").unwrap(), "goodbye");
//! assert_eq!(db.history(&ctx, "greeting").unwrap().count(), 2);
//! ```

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod history;

pub use clock::{Clock, ManualClock, MonotonicClock, SystemClock};
pub use config::{KvConfig, StorageConfig, DEFAULT_INLINE_THRESHOLD};
pub use db::{KvLog, SetOutcome, HISTORY_FILE, VALUES_FILE};
pub use error::{KvError, KvResult};
pub use history::{History, Version};

// Re-export key types
pub use kvlog_history::{FileHistoryIndex, HistoryIndex, InMemoryHistoryIndex};
pub use kvlog_log::SyncMode;
pub use kvlog_store::{FileValueStore, InMemoryValueStore, ValueStore};
pub use kvlog_types::{Context, HistoryEntry, Timestamp, ValueId, ValueRecord, ValueRef};
