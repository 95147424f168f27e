//! History index for kvlog.
//!
//! The index is an append-only log of [`HistoryEntry`] values, unique on
//! `(key, timestamp)`, that answers three queries per key: the latest entry,
//! the first entry at or after an instant, and all entries newest-first.
//!
//! # Modules
//!
//! - [`error`] — Error types for index operations
//! - [`traits`] — The [`HistoryIndex`] trait backends implement
//! - [`cursor`] — [`HistoryCursor`], the owned handle over a backend cursor
//! - [`memory`] — [`InMemoryHistoryIndex`] for tests and embedding
//! - [`file`] — [`FileHistoryIndex`], persisted to an append-only log
//!
//! [`HistoryEntry`]: kvlog_types::HistoryEntry

pub mod cursor;
pub mod error;
pub mod file;
pub mod memory;
pub mod traits;

pub use cursor::{EntryCursor, HistoryCursor};
pub use error::{IndexError, IndexResult};
pub use file::FileHistoryIndex;
pub use memory::{InMemoryHistoryIndex, DEFAULT_BATCH_SIZE};
pub use traits::HistoryIndex;
