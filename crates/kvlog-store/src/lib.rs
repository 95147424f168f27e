//! Content-addressed value storage for kvlog.
//!
//! Values too large to live inline in a history entry are stored here once,
//! keyed by the BLAKE3 hash of their whitespace-trimmed text. Many entries,
//! across many keys, may reference the same record.
//!
//! # Storage Backends
//!
//! All backends implement the [`ValueStore`] trait:
//!
//! - [`InMemoryValueStore`] -- `HashMap`-based store for tests and embedding
//! - [`FileValueStore`] -- records in an append-only file, indexed by offset
//!
//! # Design Rules
//!
//! 1. Records are write-once. There is no update and no delete.
//! 2. The same payload always hashes to the same id, so `put` is idempotent.
//! 3. Write-then-link: a value is stored before any entry references it.
//! 4. All backend errors are propagated, never silently ignored.

pub mod error;
pub mod file;
pub mod hasher;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use file::FileValueStore;
pub use hasher::{normalize, ContentHasher};
pub use memory::InMemoryValueStore;
pub use traits::ValueStore;
