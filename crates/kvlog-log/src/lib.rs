//! Append-only record log for the kvlog file backends.
//!
//! Records are serialized with bincode and framed with a length prefix and a
//! CRC32 checksum. Opening a log replays every intact record, skips records
//! whose checksum fails, and truncates a torn tail left by a crash so that
//! later appends stay reachable.

pub mod error;
pub mod record_log;

pub use error::{LogError, LogResult};
pub use record_log::{LogConfig, LogRecord, RecordLog, SyncMode};
