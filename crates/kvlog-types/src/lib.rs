//! Foundation types for kvlog, a time-versioned key-value store.
//!
//! Every other kvlog crate depends on `kvlog-types`.
//!
//! # Key Types
//!
//! - [`ValueId`] — Content-addressed identifier of a stored value
//! - [`Timestamp`] — Nanoseconds since the UNIX epoch
//! - [`ValueRef`] — A value carried inline or referenced by [`ValueId`]
//! - [`HistoryEntry`] — One version of a key
//! - [`ValueRecord`] — A deduplicated payload in the value store
//! - [`Context`] — Per-call cancellation flag and deadline

pub mod context;
pub mod entry;
pub mod error;
pub mod key;
pub mod timestamp;
pub mod value_id;

pub use context::{CancelHandle, Context, Interrupted};
pub use entry::{HistoryEntry, ValueRecord, ValueRef};
pub use error::TypeError;
pub use key::validate_key;
pub use timestamp::Timestamp;
pub use value_id::ValueId;
